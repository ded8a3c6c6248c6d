//! One-directional command queue from the control thread to the worker
//! thread, with write-once reply slots for queries.

mod query;

pub use query::{query, Pending, Reply};

use crate::camera::{CameraError, Property};
use crate::groundtruth::{ShootParams, ShootReport};

/// Every request the worker understands.
#[derive(Debug)]
pub enum Command {
    Get(Property, Reply<Result<i32, CameraError>>),
    Set(Property, i32),
    Enumerate(Property, Reply<Result<Vec<i32>, CameraError>>),
    EnumerateCameras(Reply<Vec<String>>),
    SelectCamera(usize),
    Shoot(Box<ShootParams>, Reply<anyhow::Result<ShootReport>>),
    Meta(Meta),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meta {
    Shutdown,
}

impl Command {
    /// A `Get` command and the slot its answer will arrive in.
    pub fn get(property: Property) -> (Self, Pending<Result<i32, CameraError>>) {
        let (reply, pending) = query();
        (Command::Get(property, reply), pending)
    }

    pub fn enumerate(property: Property) -> (Self, Pending<Result<Vec<i32>, CameraError>>) {
        let (reply, pending) = query();
        (Command::Enumerate(property, reply), pending)
    }

    pub fn enumerate_cameras() -> (Self, Pending<Vec<String>>) {
        let (reply, pending) = query();
        (Command::EnumerateCameras(reply), pending)
    }

    pub fn shoot(params: ShootParams) -> (Self, Pending<anyhow::Result<ShootReport>>) {
        let (reply, pending) = query();
        (Command::Shoot(Box::new(params), reply), pending)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Get(..) => "get",
            Command::Set(..) => "set",
            Command::Enumerate(..) => "enumerate",
            Command::EnumerateCameras(..) => "enumerate-cameras",
            Command::SelectCamera(..) => "select-camera",
            Command::Shoot(..) => "shoot",
            Command::Meta(..) => "meta",
        }
    }
}

/// Producer side. Cheap to clone; any number of control threads may send.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: flume::Sender<Command>,
}

/// Consumer side, owned by the single worker thread.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: flume::Receiver<Command>,
}

#[derive(Debug, thiserror::Error)]
#[error("worker thread has stopped receiving commands")]
pub struct ChannelClosed(pub Command);

/// Unbounded FIFO channel: `send` never drops a command, `poll` parks the
/// worker until one is queued.
pub fn channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = flume::unbounded();
    (CommandSender { tx }, CommandReceiver { rx })
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<(), ChannelClosed> {
        tracing::debug!("Sending {} command", command.kind());
        self.tx.send(command).map_err(|e| ChannelClosed(e.into_inner()))
    }
}

impl CommandReceiver {
    /// Block until a command is available. `None` once every sender is gone
    /// and the queue is drained.
    pub fn poll(&self) -> Option<Command> {
        self.rx.recv().ok()
    }

    /// Commands already queued, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = Command> + '_ {
        self.rx.try_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn poll_returns_commands_in_send_order() {
        let (tx, rx) = channel();
        for value in 0..50 {
            tx.send(Command::Set(Property::Iso, value)).unwrap();
        }

        let received: Vec<i32> = (0..50)
            .map(|_| match rx.poll() {
                Some(Command::Set(Property::Iso, value)) => value,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn poll_blocks_until_send() {
        let (tx, rx) = channel();
        let worker =
            thread::spawn(move || matches!(rx.poll(), Some(Command::Meta(Meta::Shutdown))));

        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());
        tx.send(Command::Meta(Meta::Shutdown)).unwrap();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn many_producers_lose_nothing() {
        let (tx, rx) = channel();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        tx.send(Command::Set(Property::Aperture, p * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        drop(tx);

        let mut per_producer = vec![Vec::new(); 4];
        while let Some(Command::Set(_, v)) = rx.poll() {
            per_producer[(v / 1000) as usize].push(v % 1000);
        }
        for seen in per_producer {
            assert_eq!(seen, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn get_round_trip_through_worker() {
        let (tx, rx) = channel();
        let worker = thread::spawn(move || {
            if let Some(Command::Get(Property::Iso, reply)) = rx.poll() {
                reply.set(Ok(0x48));
            }
        });

        let (command, pending) = Command::get(Property::Iso);
        tx.send(command).unwrap();
        assert_eq!(pending.get().unwrap().unwrap(), 0x48);
        worker.join().unwrap();
    }

    #[test]
    fn send_after_worker_exit_returns_command() {
        let (tx, rx) = channel();
        drop(rx);
        let err = tx.send(Command::SelectCamera(2)).unwrap_err();
        assert!(matches!(err.0, Command::SelectCamera(2)));
    }
}
