use super::{CapturedImage, PlaneSizeError, RgbPlane, Sample};
use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image capture failed, nothing to decode")]
    FailedImage,
    #[error("decoded image is {actual:?}, camera reported {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error(transparent)]
    Codec(#[from] image::ImageError),
    #[error(transparent)]
    Plane(#[from] PlaneSizeError),
}

/// Turns camera-native bytes into pixels.
///
/// Implemented by whatever understands the camera's native encoding.
pub trait RawDecoder: Send + Sync {
    /// Full-resolution interleaved RGB.
    fn decode_rgb<S: Sample>(&self, image: &CapturedImage) -> Result<RgbPlane<S>, DecodeError>;

    /// RGBA rendition for on-screen preview.
    fn decode_rgba(&self, image: &CapturedImage) -> Result<RgbaImage, DecodeError>;
}

/// Decoder for native buffers in any container the `image` crate reads
/// (PNG, TIFF, JPEG, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    fn load(&self, image: &CapturedImage) -> Result<image::DynamicImage, DecodeError> {
        let native = image
            .native()
            .filter(|_| !image.is_failed())
            .ok_or(DecodeError::FailedImage)?;

        let decoded = image::load_from_memory(&native.data)?;
        let actual = (decoded.width(), decoded.height());
        let expected = (image.width(), image.height());
        if actual != expected {
            return Err(DecodeError::SizeMismatch { expected, actual });
        }
        Ok(decoded)
    }
}

impl RawDecoder for ImageCrateDecoder {
    fn decode_rgb<S: Sample>(&self, image: &CapturedImage) -> Result<RgbPlane<S>, DecodeError> {
        let _span = tracing::debug_span!("decode_rgb").entered();

        let decoded = self.load(image)?;
        let (width, height) = (decoded.width(), decoded.height());
        let plane = RgbPlane::new(width, height, S::rgb_samples(decoded))?;

        Ok(match image.shared_handle() {
            Some(handle) => plane.depends_on(handle),
            None => plane,
        })
    }

    fn decode_rgba(&self, image: &CapturedImage) -> Result<RgbaImage, DecodeError> {
        Ok(self.load(image)?.into_rgba8())
    }
}
