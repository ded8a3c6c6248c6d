mod property;
pub mod readiness;
mod registry;
pub mod simulated;

pub use property::{Property, PropertyMap, INVALID_PROPERTY_VALUE};
pub use readiness::{ReadinessMonitor, Transfer};
pub use registry::CameraRegistry;
pub use simulated::{Scene, SimulatedCamera};

use crate::raw::CapturedImage;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("no camera found")]
    NoCamera,
    #[error("no camera is selected")]
    NoActiveCamera,
    #[error("camera index {0} out of range")]
    InvalidIndex(usize),
    #[error("camera is busy with a previous exposure")]
    Busy,
    #[error("camera did not become ready within {0:?}")]
    Timeout(Duration),
    #[error("wait for camera cancelled")]
    Cancelled,
    #[error("session error: {0}")]
    Session(String),
    #[error("{property} value {value:#x} not supported")]
    UnsupportedValue { property: Property, value: i32 },
    #[error("camera SDK error {code:#x}: {message}")]
    Sdk { code: u32, message: String },
}

/// A tethered camera as exposed by a vendor SDK.
///
/// `shoot` returns as soon as the exposure has been triggered; the image
/// arrives later on a thread owned by the SDK, which flips the camera back to
/// ready. Callers poll [`Camera::ready_to_shoot`] (or use
/// [`readiness::await_ready`]) and then take the image with
/// [`Camera::retrieve_last_image`].
pub trait Camera: Send {
    fn name(&self) -> &str;

    fn available(&self) -> bool {
        true
    }

    /// Open an SDK session. Called by [`CameraRegistry::select`].
    fn open_session(&mut self) -> Result<(), CameraError>;

    fn close_session(&mut self) -> Result<(), CameraError>;

    fn shoot(&self) -> Result<(), CameraError>;

    fn ready_to_shoot(&self) -> bool;

    /// Move the last delivered image out; the slot returns to the failed sentinel.
    fn retrieve_last_image(&self) -> CapturedImage;

    fn property(&self, property: Property) -> Result<i32, CameraError>;

    fn set_property(&mut self, property: Property, value: i32) -> Result<(), CameraError>;

    /// Legal values for `property` in its current mode.
    fn enumerate(&self, property: Property) -> Result<Vec<i32>, CameraError>;
}
