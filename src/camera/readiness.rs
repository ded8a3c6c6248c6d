//! Camera readiness: whether a new exposure may be triggered, and the slot
//! the SDK delivers the finished image into.
//!
//! The flag goes `Ready -> Busy` only in [`ReadinessMonitor::begin_shot`],
//! called synchronously by `shoot`, and `Busy -> Ready` only in
//! [`ReadinessMonitor::complete`], called from the SDK's completion thread.

use super::{Camera, CameraError};
use crate::raw::CapturedImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// What happened to a transfer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The image was stored and the camera is ready again.
    Accepted,
    /// No exposure was outstanding; the image was discarded.
    Cancelled,
}

#[derive(Debug)]
pub struct ReadinessMonitor {
    ready: AtomicBool,
    last_image: Mutex<CapturedImage>,
    accepted_shots: AtomicU64,
}

impl Default for ReadinessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessMonitor {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            last_image: Mutex::new(CapturedImage::failed()),
            accepted_shots: AtomicU64::new(0),
        }
    }

    /// Non-blocking readiness poll.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Claim the camera for one exposure. Fails without touching anything if
    /// an exposure is already in flight.
    pub fn begin_shot(&self) -> Result<(), CameraError> {
        self.ready
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CameraError::Busy)?;
        self.accepted_shots.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Completion notification from the SDK thread.
    ///
    /// A failed capture is reported by passing [`CapturedImage::failed`]; the
    /// camera still becomes ready so the sequence can move on.
    pub fn complete(&self, image: CapturedImage) -> Transfer {
        let mut slot = match self.last_image.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.ready.load(Ordering::Acquire) {
            tracing::warn!("Cancelling transfer with no outstanding exposure");
            return Transfer::Cancelled;
        }

        *slot = image;
        self.ready.store(true, Ordering::Release);
        Transfer::Accepted
    }

    /// Take the delivered image, leaving the failed sentinel behind.
    pub fn take_image(&self) -> CapturedImage {
        let mut slot = match self.last_image.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *slot)
    }

    pub fn accepted_shots(&self) -> u64 {
        self.accepted_shots.load(Ordering::Relaxed)
    }
}

/// Bounded wait for a camera to become ready.
#[derive(Debug, Clone, Copy)]
pub struct ReadyWait<'a> {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub cancel: Option<&'a AtomicBool>,
}

/// Poll `camera` until it is ready, calling `pump` between polls so the
/// display surface keeps presenting while the SDK works.
pub fn await_ready<F>(
    camera: &dyn Camera,
    wait: ReadyWait<'_>,
    mut pump: F,
) -> Result<(), CameraError>
where
    F: FnMut(),
{
    let deadline = Instant::now() + wait.timeout;
    loop {
        pump();
        if camera.ready_to_shoot() {
            return Ok(());
        }
        if wait.cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            return Err(CameraError::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(CameraError::Timeout(wait.timeout));
        }
        thread::sleep(wait.poll_interval.min(deadline - now));
    }
}
