//! A software camera standing in for the vendor SDK.
//!
//! It photographs a synthetic [`Scene`] composited over whatever colour the
//! virtual backdrop is showing, and delivers each exposure from its own
//! thread after a configurable latency, the way a tethered SDK does.

use super::readiness::{ReadinessMonitor, Transfer};
use super::{Camera, CameraError, Property, INVALID_PROPERTY_VALUE};
use crate::display::BackdropProbe;
use crate::raw::{CapturedImage, NativeBuffer, Sample};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::{Array2, Array3};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Ground-truth object the simulated camera photographs.
#[derive(Debug)]
pub struct Scene {
    alpha: Array2<f32>,
    foreground: Array3<f32>,
    object_present: AtomicBool,
}

impl Scene {
    /// `alpha` is (height, width); `foreground` is (height, width, 3).
    pub fn new(alpha: Array2<f32>, foreground: Array3<f32>) -> anyhow::Result<Self> {
        let (h, w, channels) = foreground.dim();
        anyhow::ensure!(
            alpha.dim() == (h, w) && channels == 3,
            "alpha {:?} and foreground {:?} do not describe the same image",
            alpha.dim(),
            foreground.dim()
        );
        Ok(Self::from_parts(alpha, foreground))
    }

    fn from_parts(alpha: Array2<f32>, foreground: Array3<f32>) -> Self {
        Self {
            alpha,
            foreground,
            object_present: AtomicBool::new(true),
        }
    }

    /// Constant alpha and colour over the whole frame.
    pub fn uniform(width: u32, height: u32, alpha: f32, foreground: [f32; 3]) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self::from_parts(
            Array2::from_elem((h, w), alpha),
            Array3::from_shape_fn((h, w, 3), |(_, _, c)| foreground[c]),
        )
    }

    /// An opaque disc with a soft rim, coloured by a horizontal gradient.
    pub fn disc(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let radius = w.min(h) as f32 * 0.3;
        let rim = (radius * 0.25).max(1.0);

        let alpha = Array2::from_shape_fn((h, w), |(y, x)| {
            let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
            ((radius - d) / rim).clamp(0.0, 1.0)
        });
        let foreground = Array3::from_shape_fn((h, w, 3), |(_, x, c)| {
            let t = x as f32 / w.max(1) as f32;
            match c {
                0 => 0.2 + 0.6 * t,
                1 => 0.7 - 0.4 * t,
                _ => 0.35,
            }
        });
        Self::from_parts(alpha, foreground)
    }

    pub fn width(&self) -> u32 {
        self.alpha.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.alpha.dim().0 as u32
    }

    pub fn alpha(&self) -> &Array2<f32> {
        &self.alpha
    }

    pub fn foreground(&self) -> &Array3<f32> {
        &self.foreground
    }

    /// Remove or replace the object between the foreground and background passes.
    pub fn set_object_present(&self, present: bool) {
        self.object_present.store(present, Ordering::Release);
    }

    /// `alpha * foreground + (1 - alpha) * backdrop` at every pixel, at 16 bits.
    pub fn render(&self, backdrop: [f32; 3]) -> ImageBuffer<Rgb<u16>, Vec<u16>> {
        let present = self.object_present.load(Ordering::Acquire);
        ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            let (x, y) = (x as usize, y as usize);
            let a = if present { self.alpha[[y, x]] } else { 0.0 };
            let mut px = [0u16; 3];
            for (c, value) in px.iter_mut().enumerate() {
                let observed = a * self.foreground[[y, x, c]] + (1.0 - a) * backdrop[c];
                *value = u16::from_unit(observed);
            }
            Rgb(px)
        })
    }
}

/// Simulated tethered camera.
pub struct SimulatedCamera {
    name: String,
    monitor: Arc<ReadinessMonitor>,
    scene: Arc<Scene>,
    backdrop: BackdropProbe,
    properties: HashMap<Property, i32>,
    session_open: bool,
    latency: Duration,
    shots: AtomicUsize,
    failing_shots: HashSet<usize>,
}

impl SimulatedCamera {
    pub fn new(name: impl Into<String>, scene: Arc<Scene>, backdrop: BackdropProbe) -> Self {
        let properties = Property::ALL
            .iter()
            .filter_map(|&p| p.mapping().valid().next().map(|(code, _)| (p, code)))
            .collect();
        Self {
            name: name.into(),
            monitor: Arc::new(ReadinessMonitor::new()),
            scene,
            backdrop,
            properties,
            session_open: false,
            latency: Duration::from_millis(30),
            shots: AtomicUsize::new(0),
            failing_shots: HashSet::new(),
        }
    }

    /// Time between the shutter and the transfer notification.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the `index`-th exposure (0-based, counted over the camera's
    /// lifetime) deliver a failed image.
    pub fn fail_shot(mut self, index: usize) -> Self {
        self.failing_shots.insert(index);
        self
    }

    pub fn monitor(&self) -> Arc<ReadinessMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Deliver a transfer notification no exposure asked for.
    pub fn inject_stale_transfer(&self) -> Transfer {
        self.monitor.complete(CapturedImage::failed())
    }

    fn expose(scene: &Scene, backdrop: [f32; 3]) -> Result<CapturedImage, image::ImageError> {
        let frame = scene.render(backdrop);
        let (width, height) = frame.dimensions();
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb16(frame).write_to(&mut encoded, ImageFormat::Png)?;

        let handle = Arc::new(NativeBuffer {
            data: encoded.into_inner(),
            extension: "png",
        });
        Ok(CapturedImage::from_shared(handle, width, height))
    }
}

impl Camera for SimulatedCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&mut self) -> Result<(), CameraError> {
        tracing::debug!("Opening simulated session for {}", self.name);
        self.session_open = true;
        Ok(())
    }

    fn close_session(&mut self) -> Result<(), CameraError> {
        tracing::debug!("Closing simulated session for {}", self.name);
        self.session_open = false;
        Ok(())
    }

    fn shoot(&self) -> Result<(), CameraError> {
        if !self.session_open {
            return Err(CameraError::Session("no open session".into()));
        }
        self.monitor.begin_shot()?;

        let index = self.shots.fetch_add(1, Ordering::Relaxed);
        let fail = self.failing_shots.contains(&index);
        let backdrop = self.backdrop.current().map(|c| c.to_unit()).unwrap_or([0.0; 3]);
        let monitor = Arc::clone(&self.monitor);
        let scene = Arc::clone(&self.scene);
        let latency = self.latency;

        thread::spawn(move || {
            thread::sleep(latency);
            let image = if fail {
                tracing::warn!("Simulated exposure {} failed", index);
                CapturedImage::failed()
            } else {
                match Self::expose(&scene, backdrop) {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::error!("Simulated exposure {} could not be encoded: {}", index, e);
                        CapturedImage::failed()
                    }
                }
            };
            monitor.complete(image);
        });
        Ok(())
    }

    fn ready_to_shoot(&self) -> bool {
        self.monitor.is_ready()
    }

    fn retrieve_last_image(&self) -> CapturedImage {
        self.monitor.take_image()
    }

    fn property(&self, property: Property) -> Result<i32, CameraError> {
        Ok(self
            .properties
            .get(&property)
            .copied()
            .unwrap_or(INVALID_PROPERTY_VALUE))
    }

    fn set_property(&mut self, property: Property, value: i32) -> Result<(), CameraError> {
        let supported =
            value != INVALID_PROPERTY_VALUE && property.mapping().text(value).is_some();
        if !supported {
            return Err(CameraError::UnsupportedValue { property, value });
        }
        self.properties.insert(property, value);
        Ok(())
    }

    fn enumerate(&self, property: Property) -> Result<Vec<i32>, CameraError> {
        Ok(property.mapping().valid().map(|(code, _)| code).collect())
    }
}
