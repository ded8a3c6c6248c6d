use std::path::PathBuf;
use std::time::Duration;

/// Timing of the shoot loop.
#[derive(Debug, Clone)]
pub struct SequenceTiming {
    /// Presentations per colour before shooting; the display may batch frames.
    pub refresh_cycles: u32,
    /// Pause between the last presentation and the shutter.
    pub settle_delay: Duration,
    /// Interval between readiness polls.
    pub poll_interval: Duration,
    /// Longest wait for a transfer notification before giving up on the camera.
    pub ready_timeout: Duration,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            refresh_cycles: 4,
            settle_delay: Duration::from_millis(40),
            poll_interval: Duration::from_millis(20),
            ready_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MattingConfig {
    /// Integer box-filter factor applied to every input before solving; 1 disables it.
    pub downsample: u32,
    /// Below this |alpha| the foreground colour is reported as black.
    pub alpha_epsilon: f64,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            downsample: 1,
            alpha_epsilon: 1e-6,
        }
    }
}

/// Where the matte is reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MattingMode {
    InProcess,
    /// Hand interchange files to a separate `groundtruth` executable.
    External { program: PathBuf },
}

#[derive(Debug, Clone)]
pub struct GroundTruthConfig {
    pub mode: MattingMode,
    pub matting: MattingConfig,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            mode: MattingMode::InProcess,
            matting: MattingConfig::default(),
        }
    }
}

/// Everything the worker thread needs besides the camera and display.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub timing: SequenceTiming,
    pub ground_truth: GroundTruthConfig,
}
