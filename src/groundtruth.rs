//! A complete shoot: foreground pass, optional background pass, image saving
//! and ground-truth reconstruction in process or through the `groundtruth`
//! executable.

use crate::camera::CameraRegistry;
use crate::capture::{capture_pass, Exposure, Pass};
use crate::color::BackdropColor;
use crate::config::{MattingConfig, MattingMode, WorkerConfig};
use crate::display::DisplayProvider;
use crate::interchange;
use crate::matting::{self, OutputNames, BACKDROPS};
use crate::raw::{BuildSample, CapturedImage, RawDecoder, RgbPlane, Sample};
use anyhow::{bail, ensure, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// What the operator asked for when pressing "shoot".
#[derive(Debug, Clone)]
pub struct ShootParams {
    pub colors: Vec<BackdropColor>,
    /// Delay before the first foreground shot.
    pub start_delay: Duration,
    /// Keep the camera's native files.
    pub save_raw: bool,
    /// Also write decoded images with this extension (e.g. "png").
    pub save_processed: Option<String>,
    /// Run the background pass and reconstruct alpha and foreground.
    pub ground_truth: bool,
    pub output_dir: PathBuf,
    /// File name prefix; the current Unix time when unset.
    pub stamp: Option<String>,
}

impl ShootParams {
    pub fn new(colors: Vec<BackdropColor>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            colors,
            start_delay: Duration::ZERO,
            save_raw: false,
            save_processed: None,
            ground_truth: false,
            output_dir: output_dir.into(),
            stamp: None,
        }
    }
}

/// Paths of the three reconstruction outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthOutputs {
    pub alpha: PathBuf,
    pub foreground: PathBuf,
    pub foreground_times_alpha: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ShootReport {
    pub stamp: String,
    /// Colours actually captured in the foreground pass, in order.
    pub foreground: Vec<BackdropColor>,
    pub background: Vec<BackdropColor>,
    pub saved: Vec<PathBuf>,
    pub ground_truth: Option<GroundTruthOutputs>,
}

/// Consulted after the foreground pass so the operator can remove the object.
pub trait BetweenPasses: Send {
    /// Delay before the first background shot, or `None` to skip ground truth.
    fn before_background(&mut self, captured: usize) -> Option<Duration>;
}

impl<F> BetweenPasses for F
where
    F: FnMut(usize) -> Option<Duration> + Send,
{
    fn before_background(&mut self, captured: usize) -> Option<Duration> {
        self(captured)
    }
}

/// Always continue after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl BetweenPasses for FixedDelay {
    fn before_background(&mut self, _captured: usize) -> Option<Duration> {
        Some(self.0)
    }
}

/// Borrowed worker state for the length of one shoot.
pub struct ShootSession<'a, D> {
    pub cameras: &'a CameraRegistry,
    pub display: &'a mut dyn DisplayProvider,
    pub pause: &'a mut dyn BetweenPasses,
    pub config: &'a WorkerConfig,
    pub decoder: &'a D,
    /// Raised by the control thread to stop the shoot between shots.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a, D: RawDecoder> ShootSession<'a, D> {
    pub fn run(&mut self, params: &ShootParams) -> Result<ShootReport> {
        ensure!(!params.colors.is_empty(), "No backdrop colours to shoot");
        if params.ground_truth {
            ensure!(
                params.colors.len() == BACKDROPS,
                "Ground truth needs exactly {} colours, got {}",
                BACKDROPS,
                params.colors.len()
            );
            let distinct: HashSet<BackdropColor> = params.colors.iter().copied().collect();
            ensure!(
                distinct.len() == BACKDROPS,
                "Ground truth needs {} distinct colours, got {}",
                BACKDROPS,
                distinct.len()
            );
        }
        fs::create_dir_all(&params.output_dir)
            .with_context(|| format!("Failed to create {}", params.output_dir.display()))?;

        let mut report = ShootReport {
            stamp: params.stamp.clone().unwrap_or_else(unix_stamp),
            ..ShootReport::default()
        };

        let start = Instant::now() + params.start_delay;
        let foreground = self.pass(params, Some(start), Pass::Foreground)?;
        report.foreground = foreground.iter().map(|e| e.color).collect();
        self.save_exposures(
            params,
            &report.stamp,
            &foreground,
            Pass::Foreground,
            &mut report.saved,
        );

        if self.cancelled() {
            tracing::info!("Shoot cancelled after the foreground pass");
            return Ok(report);
        }
        if !params.ground_truth {
            return Ok(report);
        }
        ensure!(
            foreground.len() == BACKDROPS,
            "Ground truth needs {} foreground images, captured {}",
            BACKDROPS,
            foreground.len()
        );

        let Some(delay) = self.pause.before_background(foreground.len()) else {
            tracing::info!("Ground truth cancelled");
            return Ok(report);
        };
        let background = self.pass(params, Some(Instant::now() + delay), Pass::Background)?;
        report.background = background.iter().map(|e| e.color).collect();
        self.save_exposures(
            params,
            &report.stamp,
            &background,
            Pass::Background,
            &mut report.saved,
        );

        if self.cancelled() {
            tracing::info!("Shoot cancelled during the background pass");
            return Ok(report);
        }
        ensure!(
            background.len() == BACKDROPS,
            "Ground truth needs {} background images, captured {}",
            BACKDROPS,
            background.len()
        );
        ensure!(
            report.foreground == report.background,
            "Foreground and background passes shot different colours"
        );

        let fg = self.decode_group(&foreground, Pass::Foreground)?;
        let bg = self.decode_group(&background, Pass::Background)?;
        drop(foreground);
        drop(background);

        let names = output_names(&report.stamp);
        let dir = &params.output_dir;
        let matting = &self.config.ground_truth.matting;
        match &self.config.ground_truth.mode {
            MattingMode::InProcess => self.reconstruct_here(dir, fg, bg, &names)?,
            MattingMode::External { program } => {
                reconstruct_external(program, matting, dir, &fg, &bg, &names)?
            }
        }
        report.ground_truth = Some(GroundTruthOutputs {
            alpha: dir.join(&names[0]),
            foreground: dir.join(&names[1]),
            foreground_times_alpha: dir.join(&names[2]),
        });
        Ok(report)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn pass(
        &mut self,
        params: &ShootParams,
        start: Option<Instant>,
        pass: Pass,
    ) -> Result<Vec<Exposure>> {
        capture_pass(
            self.cameras,
            &mut *self.display,
            &self.config.timing,
            self.cancel,
            &params.colors,
            start,
            pass,
        )
        .with_context(|| format!("{} pass failed", pass))
    }

    fn save_exposures(
        &self,
        params: &ShootParams,
        stamp: &str,
        exposures: &[Exposure],
        pass: Pass,
        saved: &mut Vec<PathBuf>,
    ) {
        for exposure in exposures {
            let base = format!("{}_{}{}", stamp, file_colour(exposure.color), pass.suffix());

            if params.save_raw {
                if let Some(native) = exposure.image.native() {
                    let path = params.output_dir.join(format!("{}.{}", base, native.extension));
                    match fs::write(&path, &native.data) {
                        Ok(()) => saved.push(path),
                        Err(e) => tracing::warn!("Could not save {}: {}", path.display(), e),
                    }
                }
            }

            if let Some(ext) = &params.save_processed {
                let path = params.output_dir.join(format!("{}.{}", base, ext));
                let result = self.save_processed(&exposure.image, &path);
                match result {
                    Ok(()) => saved.push(path),
                    Err(e) => tracing::warn!("Could not save {}: {:#}", path.display(), e),
                }
            }
        }
    }

    /// Decode at the build sample width and write with the image crate.
    fn save_processed(&self, image: &CapturedImage, path: &Path) -> Result<()> {
        let plane = self.decoder.decode_rgb::<BuildSample>(image)?;
        let (width, height) = (plane.width(), plane.height());
        let image = BuildSample::rgb_image(width, height, plane.into_samples())
            .context("Decoded plane does not fill an image")?;
        image.save(path)?;
        Ok(())
    }

    fn decode_group(
        &self,
        exposures: &[Exposure],
        pass: Pass,
    ) -> Result<Vec<RgbPlane<BuildSample>>> {
        let _span = tracing::debug_span!("decode", %pass).entered();
        exposures
            .iter()
            .map(|exposure| {
                self.decoder
                    .decode_rgb(&exposure.image)
                    .with_context(|| {
                        format!("Could not decode {} image for {}", pass, exposure.color)
                    })
            })
            .collect()
    }

    fn reconstruct_here(
        &self,
        dir: &Path,
        fg: Vec<RgbPlane<BuildSample>>,
        bg: Vec<RgbPlane<BuildSample>>,
        names: &[String; 3],
    ) -> Result<()> {
        let result = matting::triangulate(fg, bg, &self.config.ground_truth.matting)
            .context("Ground truth reconstruction failed")?;

        let images = {
            let _span = tracing::debug_span!("quantise").entered();
            result.to_images::<BuildSample>()
        };
        let outcomes = images.save(
            dir,
            OutputNames {
                alpha: &names[0],
                foreground: &names[1],
                foreground_times_alpha: &names[2],
            },
        );
        if outcomes.iter().any(|(_, r)| r.is_err()) {
            tracing::warn!("Some ground truth images were not saved");
        }
        Ok(())
    }
}

/// Names of the alpha, foreground and foreground-times-alpha outputs.
pub fn output_names(stamp: &str) -> [String; 3] {
    [
        format!("{}_A.png", stamp),
        format!("{}_F.png", stamp),
        format!("{}_AF.png", stamp),
    ]
}

/// Interchange temporaries for one run: five foreground then five background.
pub fn temporary_paths(dir: &Path) -> Vec<PathBuf> {
    let foreground = (0..BACKDROPS).map(|i| dir.join(format!("_temp_f_{}.rawrgb", i)));
    let background = (0..BACKDROPS).map(|i| dir.join(format!("_temp_b_{}.rawrgb", i)));
    foreground.chain(background).collect()
}

/// Removes the interchange temporaries however the run ends.
struct Temporaries(Vec<PathBuf>);

impl Drop for Temporaries {
    fn drop(&mut self) {
        for path in &self.0 {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not delete {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn reconstruct_external(
    program: &Path,
    matting: &MattingConfig,
    dir: &Path,
    fg: &[RgbPlane<BuildSample>],
    bg: &[RgbPlane<BuildSample>],
    names: &[String; 3],
) -> Result<()> {
    let temporaries = Temporaries(temporary_paths(dir));
    for (path, plane) in temporaries.0.iter().zip(fg.iter().chain(bg)) {
        interchange::save(path, plane)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    tracing::info!("Running {}", program.display());
    let status = Process::new(program)
        .arg("--downsample")
        .arg(matting.downsample.to_string())
        .arg("--alpha-epsilon")
        .arg(matting.alpha_epsilon.to_string())
        .arg(dir)
        .args(&temporaries.0)
        .args(names)
        .status()
        .with_context(|| format!("Failed to start {}", program.display()))?;
    if !status.success() {
        bail!("{} failed with {}", program.display(), status);
    }
    Ok(())
}

fn file_colour(color: BackdropColor) -> String {
    color.name().trim_start_matches('#').to_string()
}

fn unix_stamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}
