//! Capture sequencing and triangulation matting for tethered cameras.
//!
//! A control thread queues [`command::Command`]s for a single [`worker::Worker`]
//! that owns the camera. A shoot photographs the object against each backdrop
//! colour in turn, then (for ground truth) the bare backdrops, and
//! [`matting::triangulate`] recovers alpha and foreground colour from the two
//! groups.

pub mod camera;
pub mod capture;
pub mod color;
pub mod command;
pub mod config;
pub mod display;
pub mod groundtruth;
pub mod interchange;
pub mod matting;
pub mod raw;
pub mod worker;

pub use raw::BuildSample;
