//! The worker thread: sole owner of the camera registry, it executes
//! commands from the control thread one at a time in arrival order.

use crate::camera::{CameraError, CameraRegistry};
use crate::command::{Command, CommandReceiver, Meta};
use crate::config::WorkerConfig;
use crate::display::DisplayProvider;
use crate::groundtruth::{BetweenPasses, FixedDelay, ShootSession};
use crate::raw::ImageCrateDecoder;
use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct Worker {
    cameras: CameraRegistry,
    display: Box<dyn DisplayProvider>,
    pause: Box<dyn BetweenPasses>,
    config: WorkerConfig,
    decoder: ImageCrateDecoder,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        cameras: CameraRegistry,
        display: Box<dyn DisplayProvider>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            cameras,
            display,
            pause: Box::new(FixedDelay(Duration::ZERO)),
            config,
            decoder: ImageCrateDecoder,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag the control thread raises to stop the shoot in progress.
    ///
    /// It is lowered again when the next `Shoot` command starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Replace the handler consulted between the foreground and background passes.
    pub fn with_pause(mut self, pause: Box<dyn BetweenPasses>) -> Self {
        self.pause = pause;
        self
    }

    /// Run on a dedicated thread until `Meta(Shutdown)` or until every sender is gone.
    pub fn spawn(self, commands: CommandReceiver) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("camera-worker".into())
            .spawn(move || self.run(commands))
    }

    pub fn run(mut self, commands: CommandReceiver) {
        tracing::info!("Worker started");
        while let Some(command) = commands.poll() {
            if self.handle(command).is_break() {
                // Finish what was queued before the shutdown request.
                for queued in commands.drain() {
                    if let Command::Meta(Meta::Shutdown) = queued {
                        continue;
                    }
                    let _ = self.handle(queued);
                }
                break;
            }
        }
        tracing::info!("Worker stopped");
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        tracing::debug!("Handling {} command", command.kind());
        match command {
            Command::Get(property, reply) => {
                let value = self.cameras.active().and_then(|camera| camera.property(property));
                if let Err(e) = &value {
                    tracing::error!("Could not read {}: {}", property, e);
                }
                reply.set(value);
            }
            Command::Set(property, value) => {
                let result = self
                    .cameras
                    .active_mut()
                    .and_then(|camera| camera.set_property(property, value));
                match result {
                    Ok(()) => tracing::info!(
                        "{} set to {}",
                        property,
                        property.mapping().text(value).unwrap_or("?")
                    ),
                    Err(e) => tracing::error!("Could not set {}: {}", property, e),
                }
            }
            Command::Enumerate(property, reply) => {
                let values = self.cameras.active().and_then(|camera| camera.enumerate(property));
                if let Err(e) = &values {
                    tracing::error!("Could not list {} values: {}", property, e);
                }
                reply.set(values);
            }
            Command::EnumerateCameras(reply) => {
                let names = self.cameras.names();
                if names.is_empty() {
                    tracing::warn!("{}", CameraError::NoCamera);
                }
                reply.set(names);
            }
            Command::SelectCamera(index) => {
                if let Err(e) = self.cameras.select(index) {
                    tracing::error!("Could not select camera {}: {}", index, e);
                }
            }
            Command::Shoot(params, reply) => {
                self.cancel.store(false, Ordering::Release);
                let result = ShootSession {
                    cameras: &self.cameras,
                    display: self.display.as_mut(),
                    pause: self.pause.as_mut(),
                    config: &self.config,
                    decoder: &self.decoder,
                    cancel: Some(&self.cancel),
                }
                .run(&params);
                if let Err(e) = &result {
                    tracing::error!("Shoot failed: {:#}", e);
                }
                reply.set(result);
            }
            Command::Meta(Meta::Shutdown) => {
                tracing::info!("Shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
