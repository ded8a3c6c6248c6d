use super::{DisplayProvider, DisplaySurface};
use crate::color::BackdropColor;
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Shared {
    current: Mutex<Option<BackdropColor>>,
    presents: AtomicUsize,
}

/// Headless display: remembers the colour being shown so a simulated camera
/// can photograph it.
#[derive(Debug, Clone, Default)]
pub struct VirtualDisplay {
    shared: Arc<Shared>,
}

/// Read-only handle on what the virtual display currently shows.
#[derive(Debug, Clone)]
pub struct BackdropProbe {
    shared: Arc<Shared>,
}

/// Surface handed to the shoot sequencer.
#[derive(Debug)]
pub struct VirtualBackdrop {
    shared: Arc<Shared>,
}

impl VirtualDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> BackdropProbe {
        BackdropProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn surface(&self) -> VirtualBackdrop {
        VirtualBackdrop {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl BackdropProbe {
    pub fn current(&self) -> Option<BackdropColor> {
        match self.shared.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Number of frames presented so far.
    pub fn presents(&self) -> usize {
        self.shared.presents.load(Ordering::Relaxed)
    }
}

impl VirtualBackdrop {
    fn set(&self, color: Option<BackdropColor>) {
        match self.shared.current.lock() {
            Ok(mut current) => *current = color,
            Err(poisoned) => *poisoned.into_inner() = color,
        }
    }
}

impl DisplaySurface for VirtualBackdrop {
    fn show_color(&mut self, color: BackdropColor) -> Result<()> {
        self.set(Some(color));
        self.shared.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn pump_events(&mut self) {}

    fn reset(&mut self) {
        self.set(None);
    }
}

impl DisplayProvider for VirtualDisplay {
    fn open(&mut self) -> Result<Box<dyn DisplaySurface>> {
        Ok(Box::new(self.surface()))
    }
}
