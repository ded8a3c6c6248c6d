use std::path::Path;
use std::process::Command as Process;
use std::sync::Arc;
use std::time::Duration;
use trimatte::camera::{CameraRegistry, Scene, SimulatedCamera};
use trimatte::color::BackdropColor;
use trimatte::command::{self, Command, Meta};
use trimatte::config::{MattingMode, WorkerConfig};
use trimatte::display::VirtualDisplay;
use trimatte::groundtruth::{temporary_paths, ShootParams, ShootReport};
use trimatte::interchange;
use trimatte::raw::RgbPlane;
use trimatte::worker::Worker;
use trimatte::BuildSample;

const GROUNDTRUTH: &str = env!("CARGO_BIN_EXE_groundtruth");

fn palette() -> Vec<BackdropColor> {
    ["red", "lime", "blue", "black", "yellow"]
        .iter()
        .map(|name| name.parse().unwrap())
        .collect()
}

fn fast_config(mode: MattingMode) -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.timing.refresh_cycles = 1;
    config.timing.settle_delay = Duration::from_millis(1);
    config.timing.poll_interval = Duration::from_millis(1);
    config.ground_truth.mode = mode;
    config
}

fn external() -> MattingMode {
    MattingMode::External {
        program: GROUNDTRUTH.into(),
    }
}

/// Runs one ground-truth shoot of `scene` through a worker thread.
fn shoot(scene: Scene, mode: MattingMode, dir: &Path) -> ShootReport {
    shoot_with(scene, fast_config(mode), dir)
}

fn shoot_with(scene: Scene, config: WorkerConfig, dir: &Path) -> ShootReport {
    let scene = Arc::new(scene);
    let display = VirtualDisplay::new();
    let camera = SimulatedCamera::new("sim", Arc::clone(&scene), display.probe())
        .with_latency(Duration::from_millis(2));
    let mut cameras = CameraRegistry::new(vec![Box::new(camera)]);
    cameras.select_first().unwrap();

    let pause_scene = Arc::clone(&scene);
    let pause = move |_: usize| {
        pause_scene.set_object_present(false);
        Some(Duration::ZERO)
    };

    let (tx, rx) = command::channel();
    let worker = Worker::new(cameras, Box::new(display), config)
        .with_pause(Box::new(pause))
        .spawn(rx)
        .unwrap();

    let mut params = ShootParams::new(palette(), dir);
    params.ground_truth = true;
    params.stamp = Some("run".into());
    let (command, pending) = Command::shoot(params);
    tx.send(command).unwrap();
    tx.send(Command::Meta(Meta::Shutdown)).unwrap();

    let report = pending.get().unwrap().unwrap();
    worker.join().unwrap();
    report
}

#[test]
fn in_process_ground_truth_recovers_the_scene() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::uniform(6, 4, 0.5, [0.2, 0.4, 0.8]);
    let report = shoot(scene, MattingMode::InProcess, dir.path());

    assert_eq!(report.foreground, palette());
    assert_eq!(report.background, palette());
    let outputs = report.ground_truth.unwrap();

    let alpha = image::open(&outputs.alpha).unwrap().into_luma16();
    assert_eq!(alpha.dimensions(), (6, 4));
    for pixel in alpha.pixels() {
        let value = pixel[0] as f32 / u16::MAX as f32;
        assert!((value - 0.5).abs() < 0.02, "alpha {}", value);
    }

    let fg = image::open(&outputs.foreground).unwrap().into_rgb16();
    let [r, g, b] = fg.get_pixel(3, 2).0.map(|v| v as f32 / u16::MAX as f32);
    assert!((r - 0.2).abs() < 0.03 && (g - 0.4).abs() < 0.03 && (b - 0.8).abs() < 0.03);

    let premultiplied = image::open(&outputs.foreground_times_alpha).unwrap().into_rgb16();
    let blue = premultiplied.get_pixel(0, 0)[2] as f32 / u16::MAX as f32;
    assert!((blue - 0.4).abs() < 0.02);
}

#[test]
fn external_ground_truth_matches_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let report = shoot(Scene::disc(12, 12), external(), dir.path());

    let outputs = report.ground_truth.unwrap();
    let alpha = image::open(&outputs.alpha).unwrap().into_luma16();
    assert_eq!(alpha.dimensions(), (12, 12));
    assert!(alpha.get_pixel(6, 6)[0] > u16::MAX - 600);
    assert!(alpha.get_pixel(0, 11)[0] < 600);
    assert!(outputs.foreground.exists());
    assert!(outputs.foreground_times_alpha.exists());

    for path in temporary_paths(dir.path()) {
        assert!(!path.exists(), "{} left behind", path.display());
    }
}

#[test]
fn both_modes_apply_the_downsample_factor() {
    for mode in [MattingMode::InProcess, external()] {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fast_config(mode.clone());
        config.ground_truth.matting.downsample = 2;
        let report = shoot_with(Scene::disc(12, 12), config, dir.path());

        let outputs = report.ground_truth.unwrap();
        for path in [&outputs.alpha, &outputs.foreground, &outputs.foreground_times_alpha] {
            let dims = image::open(path).unwrap().into_rgb16().dimensions();
            assert_eq!(dims, (6, 6), "{:?} {}", mode, path.display());
        }
        let alpha = image::open(&outputs.alpha).unwrap().into_luma16();
        assert!(alpha.get_pixel(3, 3)[0] > u16::MAX - 600, "{:?}", mode);
        assert!(alpha.get_pixel(0, 0)[0] < 600, "{:?}", mode);
    }
}

fn write_inputs(dir: &Path, width: u32, height: u32) -> Vec<String> {
    temporary_paths(dir)
        .into_iter()
        .map(|path| {
            let plane = RgbPlane::<BuildSample>::from_fn(width, height, |_, _| [0; 3]);
            interchange::save(&path, &plane).unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

#[test]
fn groundtruth_rejects_wrong_argument_count() {
    let status = Process::new(GROUNDTRUTH).arg(".").arg("only-one").status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn groundtruth_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = write_inputs(dir.path(), 2, 2);
    inputs[7] = dir.path().join("missing.rawrgb").to_string_lossy().into_owned();

    let status = Process::new(GROUNDTRUTH)
        .arg(dir.path())
        .args(&inputs)
        .args(["A.png", "F.png", "AF.png"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
    assert!(!dir.path().join("A.png").exists());
}

#[test]
fn groundtruth_reports_mismatched_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 2, 2);
    let odd = RgbPlane::<BuildSample>::from_fn(3, 2, |_, _| [0; 3]);
    interchange::save(&inputs[9], &odd).unwrap();

    let status = Process::new(GROUNDTRUTH)
        .arg(dir.path())
        .args(&inputs)
        .args(["A.png", "F.png", "AF.png"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(3));
    assert!(!dir.path().join("A.png").exists());
}

#[test]
fn groundtruth_unwritable_output_is_only_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 2, 2);

    let status = Process::new(GROUNDTRUTH)
        .arg(dir.path())
        .args(&inputs)
        .args(["no/such/dir/A.png", "F.png", "AF.png"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));
    assert!(dir.path().join("F.png").exists());
}
