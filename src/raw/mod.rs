mod decode;
mod sample;

pub use decode::{DecodeError, ImageCrateDecoder, RawDecoder};
pub use sample::{BuildSample, Sample};

use ndarray::{ArrayView3, ShapeError};
use std::sync::Arc;

/// Camera-native bytes as delivered by the SDK, tagged with the file
/// extension the bytes would carry on disk.
#[derive(Debug)]
pub struct NativeBuffer {
    pub data: Vec<u8>,
    pub extension: &'static str,
}

#[derive(Debug)]
enum Storage {
    /// Bytes copied out of the SDK; nothing else refers to them.
    Owned(NativeBuffer),
    /// Bytes still tied to an SDK resource handle shared with other views.
    Shared(Arc<NativeBuffer>),
}

/// A single exposure as retrieved from the camera.
///
/// The default value is the "failed" sentinel that an empty slot holds. The
/// type is move-only; see [`CapturedImage::try_duplicate`] for the one case in
/// which copying is allowed.
#[derive(Debug, Default)]
pub struct CapturedImage {
    storage: Option<Storage>,
    width: u32,
    height: u32,
}

impl CapturedImage {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn from_owned(buffer: NativeBuffer, width: u32, height: u32) -> Self {
        Self {
            storage: Some(Storage::Owned(buffer)),
            width,
            height,
        }
    }

    pub fn from_shared(handle: Arc<NativeBuffer>, width: u32, height: u32) -> Self {
        Self {
            storage: Some(Storage::Shared(handle)),
            width,
            height,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.storage.is_none() || self.width == 0 || self.height == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn native(&self) -> Option<&NativeBuffer> {
        match self.storage.as_ref()? {
            Storage::Owned(buffer) => Some(buffer),
            Storage::Shared(handle) => Some(handle.as_ref()),
        }
    }

    /// The shared SDK handle, if this image aliases one.
    pub fn shared_handle(&self) -> Option<Arc<NativeBuffer>> {
        match self.storage.as_ref()? {
            Storage::Shared(handle) => Some(Arc::clone(handle)),
            Storage::Owned(_) => None,
        }
    }

    /// Deep copy, permitted only for exclusively owned buffers.
    pub fn try_duplicate(&self) -> Option<Self> {
        match self.storage.as_ref()? {
            Storage::Owned(buffer) => Some(Self::from_owned(
                NativeBuffer {
                    data: buffer.data.clone(),
                    extension: buffer.extension,
                },
                self.width,
                self.height,
            )),
            Storage::Shared(_) => None,
        }
    }
}

/// Decoded interleaved RGB samples.
///
/// A plane decoded from a shared SDK buffer keeps that buffer alive through
/// `source`, even after the [`CapturedImage`] itself has been dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbPlane<S> {
    width: u32,
    height: u32,
    samples: Vec<S>,
    source: Option<SourceHandle>,
}

#[derive(Debug, Clone)]
pub struct SourceHandle(Arc<NativeBuffer>);

impl PartialEq for SourceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("plane of {width}x{height} needs {expected} samples, got {actual}")]
pub struct PlaneSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

impl<S: Sample> RgbPlane<S> {
    pub fn new(width: u32, height: u32, samples: Vec<S>) -> Result<Self, PlaneSizeError> {
        let expected = width as usize * height as usize * 3;
        if samples.len() != expected {
            return Err(PlaneSizeError {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
            source: None,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [S; 3],
    {
        let mut samples = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                samples.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            samples,
            source: None,
        }
    }

    /// Record that this plane must not outlive `handle`.
    pub fn depends_on(mut self, handle: Arc<NativeBuffer>) -> Self {
        self.source = Some(SourceHandle(handle));
        self
    }

    pub fn source(&self) -> Option<&Arc<NativeBuffer>> {
        self.source.as_ref().map(|s| &s.0)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<S> {
        self.samples
    }

    pub fn pixel(&self, x: u32, y: u32) -> [S; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.samples[i], self.samples[i + 1], self.samples[i + 2]]
    }

    /// Row-major `(height, width, channel)` view over the samples.
    pub fn view(&self) -> Result<ArrayView3<'_, S>, ShapeError> {
        let shape = (self.height as usize, self.width as usize, 3);
        ArrayView3::from_shape(shape, &self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(bytes: &[u8]) -> NativeBuffer {
        NativeBuffer {
            data: bytes.to_vec(),
            extension: "bin",
        }
    }

    #[test]
    fn default_image_is_failed() {
        assert!(CapturedImage::default().is_failed());
        assert!(CapturedImage::from_owned(buffer(&[1]), 0, 4).is_failed());
        assert!(!CapturedImage::from_owned(buffer(&[1]), 1, 1).is_failed());
    }

    #[test]
    fn only_owned_buffers_duplicate() {
        let owned = CapturedImage::from_owned(buffer(&[1, 2, 3]), 1, 1);
        let copy = owned.try_duplicate().unwrap();
        assert_eq!(copy.native().unwrap().data, vec![1, 2, 3]);

        let shared = CapturedImage::from_shared(Arc::new(buffer(&[4])), 1, 1);
        assert!(shared.try_duplicate().is_none());
    }

    #[test]
    fn plane_keeps_source_alive() {
        let handle = Arc::new(buffer(&[9, 9, 9]));
        let image = CapturedImage::from_shared(Arc::clone(&handle), 1, 1);
        let plane = RgbPlane::<u8>::new(1, 1, vec![9, 9, 9])
            .unwrap()
            .depends_on(image.shared_handle().unwrap());
        drop(image);
        drop(handle);

        assert_eq!(plane.source().unwrap().data, vec![9, 9, 9]);
    }

    #[test]
    fn plane_rejects_wrong_length() {
        let err = RgbPlane::<u8>::new(2, 2, vec![0; 11]).unwrap_err();
        assert_eq!(err.expected, 12);
        assert_eq!(err.actual, 11);
    }

    #[test]
    fn view_indexes_row_major() {
        let plane = RgbPlane::<u8>::from_fn(3, 2, |x, y| [x as u8, y as u8, 7]);
        let view = plane.view().unwrap();
        assert_eq!(view.dim(), (2, 3, 3));
        assert_eq!(view[[1, 2, 0]], 2);
        assert_eq!(view[[1, 2, 1]], 1);
        assert_eq!(plane.pixel(2, 1), [2, 1, 7]);
    }

    #[test]
    fn view_of_short_buffer_is_an_error() {
        let plane = RgbPlane::<u8> {
            width: 2,
            height: 2,
            samples: vec![0; 11],
            source: None,
        };
        assert!(plane.view().is_err());
    }
}
