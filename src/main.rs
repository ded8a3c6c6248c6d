use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use trimatte::camera::{CameraRegistry, Property, Scene, SimulatedCamera};
use trimatte::color::{self, BackdropColor};
use trimatte::command::{self, Command, CommandSender, Meta};
use trimatte::config::{GroundTruthConfig, MattingConfig, MattingMode, WorkerConfig};
use trimatte::display::VirtualDisplay;
use trimatte::groundtruth::{ShootParams, ShootReport};
use trimatte::worker::Worker;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Palette file: one hex or named colour per line
    #[arg(short, long)]
    palette: Option<PathBuf>,

    /// Backdrop colour, repeatable; appended after the palette file
    #[arg(short, long = "color")]
    colors: Vec<BackdropColor>,

    /// Write the colours used to this palette file
    #[arg(long)]
    save_palette: Option<PathBuf>,

    /// Directory for captured and reconstructed images
    #[arg(short, long, default_value = "captures")]
    output_dir: PathBuf,

    /// Seconds to wait before the first foreground shot
    #[arg(long, default_value_t = 0.0)]
    start_delay: f32,

    /// Seconds to wait after removing the object, before the background pass
    #[arg(long, default_value_t = 2.0)]
    background_delay: f32,

    /// Shoot the bare backdrops too and reconstruct alpha and foreground
    #[arg(long)]
    ground_truth: bool,

    /// Reconstruct with this `groundtruth` executable instead of in process
    #[arg(long)]
    external_groundtruth: Option<PathBuf>,

    /// Keep the camera's native files
    #[arg(long)]
    save_raw: bool,

    /// Also save decoded images with this extension (png, bmp, tif, ...)
    #[arg(long)]
    save_processed: Option<String>,

    /// Box-filter factor applied before solving; 1 keeps full resolution
    #[arg(long, default_value_t = 1)]
    downsample: u32,

    /// ISO speed, e.g. "400"
    #[arg(long)]
    iso: Option<String>,

    /// Aperture, e.g. "5.6"
    #[arg(long)]
    aperture: Option<String>,

    /// Shutter speed, e.g. "1/125"
    #[arg(long)]
    shutter: Option<String>,

    /// White balance, e.g. "Daylight"
    #[arg(long)]
    white_balance: Option<String>,

    /// Print the values each camera property accepts
    #[arg(long)]
    list_properties: bool,

    /// Simulated scene width
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Simulated scene height
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Simulated delay between shutter and image transfer, in milliseconds
    #[arg(long, default_value_t = 30)]
    latency_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Palette used when none is given on the command line.
const DEFAULT_PALETTE: [BackdropColor; 5] = [
    BackdropColor::new(255, 0, 0),
    BackdropColor::new(0, 255, 0),
    BackdropColor::new(0, 0, 255),
    BackdropColor::new(0, 0, 0),
    BackdropColor::new(255, 255, 0),
];

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("trimatte starting");

    let colors = backdrop_colors(&args)?;
    tracing::info!(
        "Backdrops: {}",
        colors.iter().map(BackdropColor::name).collect::<Vec<_>>().join(", ")
    );
    if let Some(path) = &args.save_palette {
        color::save_palette(path, &colors)?;
    }

    // Simulated rig: the camera photographs the scene over the virtual backdrop
    let display = VirtualDisplay::new();
    let scene = Arc::new(Scene::disc(args.width, args.height));
    let camera = SimulatedCamera::new("Simulated EOS", Arc::clone(&scene), display.probe())
        .with_latency(Duration::from_millis(args.latency_ms));
    let mut cameras = CameraRegistry::new(vec![Box::new(camera)]);
    cameras.select_first().context("Failed to open camera session")?;

    let config = WorkerConfig {
        ground_truth: GroundTruthConfig {
            mode: match &args.external_groundtruth {
                Some(program) => MattingMode::External {
                    program: program.clone(),
                },
                None => MattingMode::InProcess,
            },
            matting: MattingConfig {
                downsample: args.downsample,
                ..MattingConfig::default()
            },
        },
        ..WorkerConfig::default()
    };

    let background_delay = Duration::from_secs_f32(args.background_delay.max(0.0));
    let pause_scene = Arc::clone(&scene);
    let pause = move |captured: usize| {
        tracing::info!("Foreground pass captured {} images; removing the object", captured);
        pause_scene.set_object_present(false);
        Some(background_delay)
    };

    let (tx, rx) = command::channel();
    let worker = Worker::new(cameras, Box::new(display), config)
        .with_pause(Box::new(pause))
        .spawn(rx)
        .context("Failed to start worker thread")?;

    let result = drive(&tx, &args, colors);

    tx.send(Command::Meta(Meta::Shutdown))
        .map_err(|_| anyhow!("Worker stopped before shutdown"))?;
    worker.join().map_err(|_| anyhow!("Worker thread panicked"))?;

    let report = result?;
    print_report(&report);
    Ok(())
}

fn backdrop_colors(args: &Args) -> Result<Vec<BackdropColor>> {
    let mut colors = match &args.palette {
        Some(path) => color::load_palette(path)?,
        None => Vec::new(),
    };
    colors.extend(args.colors.iter().copied());
    if colors.is_empty() {
        colors = DEFAULT_PALETTE.to_vec();
    }
    Ok(colors)
}

/// Everything the control thread asks of the worker, in order.
fn drive(tx: &CommandSender, args: &Args, colors: Vec<BackdropColor>) -> Result<ShootReport> {
    let (list, pending) = Command::enumerate_cameras();
    send(tx, list)?;
    for (index, name) in pending.get()?.iter().enumerate() {
        tracing::info!("Camera {}: {}", index, name);
    }

    let requested = [
        (Property::Iso, &args.iso),
        (Property::Aperture, &args.aperture),
        (Property::ShutterSpeed, &args.shutter),
        (Property::WhiteBalance, &args.white_balance),
    ];
    for (property, text) in requested {
        let Some(text) = text else { continue };
        let Some(code) = property.mapping().code(text) else {
            let valid: Vec<_> = property.mapping().valid().map(|(_, t)| t).collect();
            bail!("Unknown {} value {:?}; expected one of: {}", property, text, valid.join(", "));
        };
        send(tx, Command::Set(property, code))?;
    }

    for property in Property::ALL {
        let (get, pending) = Command::get(property);
        send(tx, get)?;
        match pending.get()? {
            Ok(code) => {
                let text = property.mapping().text(code).unwrap_or("unknown");
                tracing::info!("{}: {}", property, text);
            }
            Err(e) => tracing::warn!("{}: {}", property, e),
        }

        if args.list_properties {
            let (list, pending) = Command::enumerate(property);
            send(tx, list)?;
            let values: Vec<_> = pending
                .get()??
                .into_iter()
                .filter_map(|code| property.mapping().text(code))
                .collect();
            println!("{}: {}", property, values.join(", "));
        }
    }

    let params = ShootParams {
        start_delay: Duration::from_secs_f32(args.start_delay.max(0.0)),
        save_raw: args.save_raw,
        save_processed: args.save_processed.clone(),
        ground_truth: args.ground_truth,
        ..ShootParams::new(colors, &args.output_dir)
    };
    let (shoot, pending) = Command::shoot(params);
    send(tx, shoot)?;
    pending.get()?
}

fn send(tx: &CommandSender, command: Command) -> Result<()> {
    tx.send(command).map_err(|e| anyhow!("Could not send {} command: {}", e.0.kind(), e))
}

fn print_report(report: &ShootReport) {
    tracing::info!(
        "Shoot {}: {} foreground, {} background images",
        report.stamp,
        report.foreground.len(),
        report.background.len()
    );
    for path in &report.saved {
        println!("{}", path.display());
    }
    if let Some(outputs) = &report.ground_truth {
        println!("{}", outputs.alpha.display());
        println!("{}", outputs.foreground.display());
        println!("{}", outputs.foreground_times_alpha.display());
    }
}
