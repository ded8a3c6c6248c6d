use super::MattingError;
use crate::raw::{RgbPlane, Sample};
use ndarray::{Array2, Array3, ArrayView3};

/// Converts sample planes into the float arrays the solver works on
pub struct Preprocessor {
    factor: usize,
}

impl Preprocessor {
    /// `factor` is the box-filter size; 1 keeps full resolution.
    pub fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1) as usize,
        }
    }

    /// Dimensions of the solver grid for a `width` x `height` input, as (height, width).
    pub fn output_shape(&self, width: u32, height: u32) -> (usize, usize) {
        (height as usize / self.factor, width as usize / self.factor)
    }

    /// Normalize a plane to [0, 1] floats with shape (height, width, 3).
    ///
    /// With a factor above 1 every output pixel is the mean of a
    /// `factor` x `factor` block; trailing rows and columns that do not fill
    /// a whole block are dropped.
    pub fn preprocess<S: Sample>(&self, plane: &RgbPlane<S>) -> Result<Array3<f32>, MattingError> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = plane.dimensions();
        let view = plane
            .view()
            .map_err(|_| MattingError::Layout { width, height })?;
        if self.factor == 1 {
            return Ok(view.mapv(|s| s.to_unit()));
        }
        Ok(box_filter(view, self.factor))
    }
}

fn box_filter<S: Sample>(view: ArrayView3<'_, S>, factor: usize) -> Array3<f32> {
    let (height, width, _) = view.dim();
    let shape = (height / factor, width / factor, 3);
    let scale = 1.0 / (factor * factor) as f32;

    Array3::from_shape_fn(shape, |(y, x, c)| {
        let mut sum = 0.0;
        for dy in 0..factor {
            for dx in 0..factor {
                sum += view[[y * factor + dy, x * factor + dx, c]].to_unit();
            }
        }
        sum * scale
    })
}

/// Quantise a single-channel float array, clamping to [0, 1].
pub fn quantise_luma<S: Sample>(values: &Array2<f32>) -> Vec<S> {
    values.iter().map(|&v| S::from_unit(v)).collect()
}

/// Quantise an interleaved (height, width, 3) float array, clamping to [0, 1].
pub fn quantise_rgb<S: Sample>(values: &Array3<f32>) -> Vec<S> {
    values.iter().map(|&v| S::from_unit(v)).collect()
}
