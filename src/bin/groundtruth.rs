//! Reconstruct alpha and foreground from ten interchange files.
//!
//! Exit status: 0 on success, 1 for bad arguments, 2 if an input cannot be
//! loaded, 3 if the reconstruction fails. Output files that cannot be written
//! only produce a warning.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trimatte::config::MattingConfig;
use trimatte::interchange;
use trimatte::matting::{self, OutputNames, BACKDROPS};
use trimatte::raw::RgbPlane;
use trimatte::BuildSample;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory the outputs are written to
    dir: PathBuf,

    /// Five foreground files, five background files, then the alpha,
    /// foreground and foreground-times-alpha output names
    #[arg(num_args = 13, required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Box-filter factor applied before solving; 1 keeps full resolution
    #[arg(long, default_value_t = 1)]
    downsample: u32,

    /// Below this |alpha| the recovered foreground is black
    #[arg(long, default_value_t = MattingConfig::default().alpha_epsilon)]
    alpha_epsilon: f64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

const EXIT_BAD_ARGS: u8 = 1;
const EXIT_LOAD_FAILED: u8 = 2;
const EXIT_RECONSTRUCTION_FAILED: u8 = 3;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_BAD_ARGS)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let (inputs, outputs) = args.files.split_at(2 * BACKDROPS);
    let mut planes = Vec::with_capacity(inputs.len());
    for path in inputs {
        match interchange::load::<BuildSample, _>(path) {
            Ok(plane) => planes.push(plane),
            Err(e) => {
                tracing::error!("Could not load {}: {}", path.display(), e);
                return ExitCode::from(EXIT_LOAD_FAILED);
            }
        }
    }
    let background: Vec<RgbPlane<BuildSample>> = planes.split_off(BACKDROPS);
    let foreground = planes;

    let config = MattingConfig {
        downsample: args.downsample,
        alpha_epsilon: args.alpha_epsilon,
    };
    let result = match matting::triangulate(foreground, background, &config) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Reconstruction failed: {}", e);
            return ExitCode::from(EXIT_RECONSTRUCTION_FAILED);
        }
    };

    let names: Vec<String> = outputs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let outcomes = result.to_images::<BuildSample>().save(
        &args.dir,
        OutputNames {
            alpha: &names[0],
            foreground: &names[1],
            foreground_times_alpha: &names[2],
        },
    );
    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        tracing::warn!("{} of {} outputs were not written", failed, outcomes.len());
    }
    ExitCode::SUCCESS
}
