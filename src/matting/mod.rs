//! Triangulation matting: recover alpha and foreground colour from the same
//! object shot against several known backdrops.

mod preprocess;
mod solve;

pub use preprocess::Preprocessor;
pub use solve::{solve_pixel, PixelEstimate, BACKDROPS};

use crate::config::MattingConfig;
use crate::raw::{RgbPlane, Sample};
use image::DynamicImage;
use ndarray::{Array2, Array3, Axis, Zip};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Which group of inputs a precondition failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageGroup {
    Foreground,
    Background,
}

impl fmt::Display for ImageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageGroup::Foreground => "foreground",
            ImageGroup::Background => "background",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MattingError {
    #[error("expected 5 {group} images, got {count}")]
    WrongImageCount { group: ImageGroup, count: usize },
    #[error("{group} image {index} is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        group: ImageGroup,
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("input images are empty")]
    Empty,
    #[error("downsample factor must be at least 1")]
    InvalidDownsample,
    #[error("downsampling {width}x{height} by {factor} leaves no pixels")]
    TooSmall { width: u32, height: u32, factor: u32 },
    #[error("{width}x{height} plane holds the wrong number of samples")]
    Layout { width: u32, height: u32 },
}

/// Float outputs of a reconstruction, all of shape (height, width[, 3]).
///
/// Values are not clamped here; quantisation clamps to [0, 1].
#[derive(Debug, Clone)]
pub struct MattingResult {
    pub alpha: Array2<f32>,
    pub foreground: Array3<f32>,
    pub foreground_times_alpha: Array3<f32>,
}

/// Quantised outputs ready to be written out
#[derive(Debug, Clone)]
pub struct MatteImages {
    pub alpha: DynamicImage,
    pub foreground: DynamicImage,
    pub foreground_times_alpha: DynamicImage,
}

/// File names of the three outputs, relative to an output directory
#[derive(Debug, Clone, Copy)]
pub struct OutputNames<'a> {
    pub alpha: &'a str,
    pub foreground: &'a str,
    pub foreground_times_alpha: &'a str,
}

impl MattingResult {
    pub fn width(&self) -> u32 {
        self.alpha.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.alpha.nrows() as u32
    }

    /// Clamp to [0, 1] and quantise to `S`.
    pub fn to_images<S: Sample>(&self) -> MatteImages {
        let (width, height) = (self.width(), self.height());
        // Lengths follow from the array shapes.
        let luma = |values: &Array2<f32>| {
            let samples = preprocess::quantise_luma::<S>(values);
            S::luma_image(width, height, samples)
                .unwrap_or_else(|| DynamicImage::new_luma8(width, height))
        };
        let rgb = |values: &Array3<f32>| {
            let samples = preprocess::quantise_rgb::<S>(values);
            S::rgb_image(width, height, samples)
                .unwrap_or_else(|| DynamicImage::new_rgb8(width, height))
        };
        MatteImages {
            alpha: luma(&self.alpha),
            foreground: rgb(&self.foreground),
            foreground_times_alpha: rgb(&self.foreground_times_alpha),
        }
    }
}

impl MatteImages {
    /// Write all three images into `dir`. Failures are reported per file so
    /// one bad path does not lose the other outputs.
    pub fn save(
        &self,
        dir: &Path,
        names: OutputNames<'_>,
    ) -> Vec<(String, image::ImageResult<()>)> {
        [
            (names.alpha, &self.alpha),
            (names.foreground, &self.foreground),
            (names.foreground_times_alpha, &self.foreground_times_alpha),
        ]
        .into_iter()
        .map(|(name, image)| {
            let path = dir.join(name);
            let result = image.save(&path);
            match &result {
                Ok(()) => tracing::info!("Wrote {}", path.display()),
                Err(e) => tracing::warn!("Could not write {}: {}", path.display(), e),
            }
            (name.to_string(), result)
        })
        .collect()
    }
}

fn check_group<S: Sample>(
    planes: &[RgbPlane<S>],
    group: ImageGroup,
    expected: (u32, u32),
) -> Result<(), MattingError> {
    if planes.len() != BACKDROPS {
        return Err(MattingError::WrongImageCount {
            group,
            count: planes.len(),
        });
    }
    for (index, plane) in planes.iter().enumerate() {
        if plane.dimensions() != expected {
            return Err(MattingError::DimensionMismatch {
                group,
                index,
                expected,
                actual: plane.dimensions(),
            });
        }
    }
    Ok(())
}

/// Reconstruct alpha and foreground colour from five foreground shots and
/// the five matching background shots, paired by index.
///
/// Inputs are consumed and released as they are converted to floats.
pub fn triangulate<S: Sample>(
    foreground: Vec<RgbPlane<S>>,
    background: Vec<RgbPlane<S>>,
    config: &MattingConfig,
) -> Result<MattingResult, MattingError> {
    let _span = tracing::info_span!("triangulate").entered();

    let expected = match foreground.first().or_else(|| background.first()) {
        Some(plane) => plane.dimensions(),
        None => {
            return Err(MattingError::WrongImageCount {
                group: ImageGroup::Foreground,
                count: 0,
            })
        }
    };
    check_group(&foreground, ImageGroup::Foreground, expected)?;
    check_group(&background, ImageGroup::Background, expected)?;

    let (width, height) = expected;
    if width == 0 || height == 0 {
        return Err(MattingError::Empty);
    }
    if config.downsample == 0 {
        return Err(MattingError::InvalidDownsample);
    }
    let pre = Preprocessor::new(config.downsample);
    let (rows, cols) = pre.output_shape(width, height);
    if rows == 0 || cols == 0 {
        return Err(MattingError::TooSmall {
            width,
            height,
            factor: config.downsample,
        });
    }

    tracing::info!("Solving {}x{} pixels", cols, rows);
    let observed = normalize_all(&pre, foreground)?;
    let backdrops = normalize_all(&pre, background)?;

    let mut alpha = Array2::<f32>::zeros((rows, cols));
    let mut fg = Array3::<f32>::zeros((rows, cols, 3));
    let mut fg_alpha = Array3::<f32>::zeros((rows, cols, 3));
    let epsilon = config.alpha_epsilon;

    Zip::indexed(&mut alpha)
        .and(fg.lanes_mut(Axis(2)))
        .and(fg_alpha.lanes_mut(Axis(2)))
        .par_for_each(|(y, x), alpha, mut fg, mut fg_alpha| {
            let at = |planes: &[Array3<f32>]| -> [[f32; 3]; BACKDROPS] {
                std::array::from_fn(|k| std::array::from_fn(|c| planes[k][[y, x, c]]))
            };
            let estimate = solve_pixel(&at(&observed), &at(&backdrops));
            let colour = estimate.foreground(epsilon);

            *alpha = estimate.alpha as f32;
            for c in 0..3 {
                fg[c] = colour[c] as f32;
                fg_alpha[c] = estimate.premultiplied[c] as f32;
            }
        });

    Ok(MattingResult {
        alpha,
        foreground: fg,
        foreground_times_alpha: fg_alpha,
    })
}

fn normalize_all<S: Sample>(
    pre: &Preprocessor,
    planes: Vec<RgbPlane<S>>,
) -> Result<Vec<Array3<f32>>, MattingError> {
    planes
        .into_iter()
        .map(|plane| pre.preprocess(&plane))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PALETTE: [[u8; 3]; BACKDROPS] =
        [[255, 0, 0], [0, 255, 0], [0, 0, 255], [0, 0, 0], [255, 255, 0]];

    fn backdrops(width: u32, height: u32) -> Vec<RgbPlane<u8>> {
        PALETTE
            .iter()
            .map(|&colour| RgbPlane::from_fn(width, height, |_, _| colour))
            .collect()
    }

    /// Left column opaque grey-blue, right column untouched backdrop.
    fn half_covered(width: u32, height: u32) -> Vec<RgbPlane<u8>> {
        PALETTE
            .iter()
            .map(|&colour| {
                RgbPlane::from_fn(width, height, |x, _| {
                    if x < width / 2 {
                        [51, 102, 204]
                    } else {
                        colour
                    }
                })
            })
            .collect()
    }

    #[test]
    fn recovers_opaque_and_transparent_regions() {
        let result =
            triangulate(half_covered(4, 2), backdrops(4, 2), &MattingConfig::default()).unwrap();
        assert_eq!((result.width(), result.height()), (4, 2));

        assert_relative_eq!(result.alpha[[1, 0]], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.foreground[[1, 0, 0]], 0.2, epsilon = 1e-4);
        assert_relative_eq!(result.foreground[[1, 0, 2]], 0.8, epsilon = 1e-4);

        assert_relative_eq!(result.alpha[[0, 3]], 0.0, epsilon = 1e-4);
        assert_eq!(result.foreground[[0, 3, 1]], 0.0);
        assert_relative_eq!(result.foreground_times_alpha[[0, 3, 1]], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn quantised_outputs_match_dimensions() {
        let result =
            triangulate(half_covered(4, 2), backdrops(4, 2), &MattingConfig::default()).unwrap();
        let images = result.to_images::<u8>();
        let alpha = images.alpha.into_luma8();
        assert_eq!(alpha.dimensions(), (4, 2));
        assert_eq!(alpha.get_pixel(0, 0)[0], 255);
        assert_eq!(alpha.get_pixel(3, 1)[0], 0);
        let fg = images.foreground.into_rgb8();
        assert_eq!(fg.get_pixel(1, 0).0, [51, 102, 204]);
        assert_eq!(fg.get_pixel(2, 0).0, [0, 0, 0]);

        let wide = result.to_images::<u16>();
        assert_eq!(wide.alpha.into_luma16().get_pixel(0, 1)[0], u16::MAX);
    }

    #[test]
    fn downsample_halves_the_grid() {
        let config = MattingConfig {
            downsample: 2,
            ..MattingConfig::default()
        };
        let result = triangulate(half_covered(4, 4), backdrops(4, 4), &config).unwrap();
        assert_eq!(result.alpha.dim(), (2, 2));
        assert_relative_eq!(result.alpha[[0, 0]], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.alpha[[1, 1]], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn rejects_wrong_image_count() {
        let mut fg = backdrops(2, 2);
        fg.pop();
        let err = triangulate(fg, backdrops(2, 2), &MattingConfig::default()).unwrap_err();
        assert_eq!(
            err,
            MattingError::WrongImageCount {
                group: ImageGroup::Foreground,
                count: 4
            }
        );
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut bg = backdrops(3, 2);
        bg[4] = RgbPlane::from_fn(2, 3, |_, _| [0, 0, 0]);
        let err = triangulate(backdrops(3, 2), bg, &MattingConfig::default()).unwrap_err();
        assert_eq!(
            err,
            MattingError::DimensionMismatch {
                group: ImageGroup::Background,
                index: 4,
                expected: (3, 2),
                actual: (2, 3),
            }
        );
    }

    #[test]
    fn rejects_downsample_larger_than_image() {
        let config = MattingConfig {
            downsample: 8,
            ..MattingConfig::default()
        };
        let err = triangulate(backdrops(4, 4), backdrops(4, 4), &config).unwrap_err();
        assert!(matches!(err, MattingError::TooSmall { factor: 8, .. }));
    }

    #[test]
    fn save_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            triangulate(half_covered(2, 2), backdrops(2, 2), &MattingConfig::default()).unwrap();
        let names = OutputNames {
            alpha: "A.png",
            foreground: "F.png",
            foreground_times_alpha: "AF.png",
        };
        let outcomes = result.to_images::<u8>().save(dir.path(), names);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert!(dir.path().join("AF.png").exists());

        let missing = dir.path().join("missing");
        let outcomes = result.to_images::<u8>().save(&missing, names);
        assert!(outcomes.iter().all(|(_, r)| r.is_err()));
    }
}
