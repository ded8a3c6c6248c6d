mod virtual_backdrop;

pub use virtual_backdrop::{BackdropProbe, VirtualBackdrop, VirtualDisplay};

use crate::color::BackdropColor;
use anyhow::Result;

/// Full-screen colour swatch placed behind the object
pub trait DisplaySurface {
    /// Fill the surface with `color` and present it
    fn show_color(&mut self, color: BackdropColor) -> Result<()>;

    /// Process pending window events so presentation is not starved
    fn pump_events(&mut self);

    /// Return the surface to its idle state
    fn reset(&mut self);
}

/// Creates a display surface for one shoot sequence
pub trait DisplayProvider: Send {
    fn open(&mut self) -> Result<Box<dyn DisplaySurface>>;
}
