mod sequencer;

pub use sequencer::{capture_pass, ShootSequencer};

use crate::color::BackdropColor;
use crate::raw::CapturedImage;
use std::fmt;

/// Which of the two shoot sequences an exposure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Object in front of the backdrop
    Foreground,
    /// Same backdrops with the object removed
    Background,
}

impl Pass {
    /// File name suffix for images of this pass
    pub fn suffix(self) -> &'static str {
        match self {
            Pass::Foreground => "_foreground",
            Pass::Background => "_background",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pass::Foreground => "foreground",
            Pass::Background => "background",
        })
    }
}

/// One successful exposure against one backdrop colour
#[derive(Debug)]
pub struct Exposure {
    /// Position of `color` in the requested colour list
    pub index: usize,
    pub color: BackdropColor,
    pub image: CapturedImage,
}
