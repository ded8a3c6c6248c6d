use std::fmt;

/// Write side of a single-shot result slot. Consumed by [`Reply::set`], so
/// it can be fulfilled at most once.
pub struct Reply<T> {
    tx: flume::Sender<T>,
}

/// Read side of a single-shot result slot. Consumed by [`Pending::get`].
pub struct Pending<T> {
    rx: flume::Receiver<T>,
}

/// The reply slot was dropped by the handler without ever being set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("query was dropped without a reply")]
pub struct Abandoned;

pub fn query<T>() -> (Reply<T>, Pending<T>) {
    let (tx, rx) = flume::bounded(1);
    (Reply { tx }, Pending { rx })
}

impl<T> Reply<T> {
    pub fn set(self, value: T) {
        // The requester may have given up waiting; nothing to do then.
        if self.tx.send(value).is_err() {
            tracing::debug!("Reply discarded, requester is gone");
        }
    }
}

impl<T> Pending<T> {
    /// Block until the handler replies.
    pub fn get(self) -> Result<T, Abandoned> {
        self.rx.recv().map_err(|_| Abandoned)
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply").finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}
