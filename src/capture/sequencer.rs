use super::{Exposure, Pass};
use crate::camera::readiness::{await_ready, ReadyWait};
use crate::camera::{Camera, CameraError, CameraRegistry};
use crate::color::BackdropColor;
use crate::config::SequenceTiming;
use crate::display::{DisplayProvider, DisplaySurface};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

/// Photographs the object once per backdrop colour, in order.
pub struct ShootSequencer<'a> {
    camera: &'a dyn Camera,
    display: &'a mut dyn DisplaySurface,
    timing: &'a SequenceTiming,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ShootSequencer<'a> {
    pub fn new(
        camera: &'a dyn Camera,
        display: &'a mut dyn DisplaySurface,
        timing: &'a SequenceTiming,
    ) -> Self {
        Self {
            camera,
            display,
            timing,
            cancel: None,
        }
    }

    /// Stop the pass once `cancel` is raised. A shot already in flight is
    /// abandoned; colours not yet shown are skipped.
    pub fn with_cancel(mut self, cancel: Option<&'a AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one pass over `colors`.
    ///
    /// With `start` set, the first shutter is held back until that instant so
    /// the operator can step away. Failed shots are dropped, so the result may
    /// be shorter than `colors`; it keeps the input order.
    pub fn run(
        &mut self,
        colors: &[BackdropColor],
        start: Option<Instant>,
        pass: Pass,
    ) -> Vec<Exposure> {
        let _span = tracing::info_span!("shoot_sequence", %pass).entered();
        tracing::info!("Shooting {} colours", colors.len());

        let mut exposures = Vec::with_capacity(colors.len());
        for (index, &color) in colors.iter().enumerate() {
            if self.cancelled() {
                tracing::info!("{} pass cancelled before {}", pass, color);
                break;
            }
            if let Err(e) = self.present(color) {
                tracing::error!("Could not show {}: {:#}", color, e);
                continue;
            }

            if index == 0 {
                if let Some(start) = start {
                    sleep_until(start);
                }
            }
            thread::sleep(self.timing.settle_delay);

            match self.shoot_one() {
                Ok(()) => {}
                Err(CameraError::Busy) => {
                    tracing::error!("Camera busy, skipping {}", color);
                    continue;
                }
                Err(e @ (CameraError::Timeout(_) | CameraError::Cancelled)) => {
                    tracing::error!("Abandoning {} pass at {}: {}", pass, color, e);
                    break;
                }
                Err(e) => {
                    tracing::error!("Shot against {} failed: {}", color, e);
                    continue;
                }
            }

            let image = self.camera.retrieve_last_image();
            if image.is_failed() {
                tracing::error!("Error retrieving image for {}", color);
                continue;
            }
            tracing::debug!("Captured {}x{} against {}", image.width(), image.height(), color);
            exposures.push(Exposure { index, color, image });
        }

        self.display.reset();
        tracing::info!("{} pass captured {}/{} images", pass, exposures.len(), colors.len());
        exposures
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn present(&mut self, color: BackdropColor) -> Result<()> {
        for _ in 0..self.timing.refresh_cycles.max(1) {
            self.display.pump_events();
            self.display.show_color(color)?;
        }
        Ok(())
    }

    fn shoot_one(&mut self) -> Result<(), CameraError> {
        self.camera.shoot()?;

        let wait = ReadyWait {
            timeout: self.timing.ready_timeout,
            poll_interval: self.timing.poll_interval,
            cancel: self.cancel,
        };
        let display = &mut *self.display;
        await_ready(self.camera, wait, || display.pump_events())
    }
}

fn sleep_until(start: Instant) {
    let now = Instant::now();
    if start > now {
        tracing::info!("Waiting {:.1}s before the first shot", (start - now).as_secs_f32());
        thread::sleep(start - now);
    }
}

/// Open a display surface and run one pass on the selected camera.
///
/// Errors here are the unrecoverable kind: no surface, no camera. Individual
/// shot failures and cancellation only shorten the returned list.
pub fn capture_pass(
    cameras: &CameraRegistry,
    display: &mut dyn DisplayProvider,
    timing: &SequenceTiming,
    cancel: Option<&AtomicBool>,
    colors: &[BackdropColor],
    start: Option<Instant>,
    pass: Pass,
) -> Result<Vec<Exposure>> {
    let camera = cameras.active().context("No camera to shoot with")?;
    let mut surface = display.open().context("Could not create display surface")?;
    Ok(ShootSequencer::new(camera, surface.as_mut(), timing)
        .with_cancel(cancel)
        .run(colors, start, pass))
}
