//! Job progress reporting.

use std::sync::Arc;

/// Progress callback for job execution.
pub type ProgressCallback = Arc<dyn Fn(JobProgress) + Send + Sync>;

/// Job progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    /// Current stage.
    pub stage: JobStage,

    /// Progress within the composing stage [0.0, 1.0].
    pub progress: f64,

    /// Output time encoded so far, in seconds.
    pub out_time_secs: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,
}

/// Stages of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Preparing,
    Downloading,
    Planning,
    Composing,
    Delivering,
    Complete,
    Failed,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Preparing => "preparing",
            JobStage::Downloading => "downloading",
            JobStage::Planning => "planning",
            JobStage::Composing => "composing",
            JobStage::Delivering => "delivering",
            JobStage::Complete => "complete",
            JobStage::Failed => "failed",
        }
    }
}

impl JobProgress {
    /// A report carrying only a stage change.
    pub fn stage(stage: JobStage) -> Self {
        Self {
            stage,
            progress: if stage == JobStage::Complete { 1.0 } else { 0.0 },
            out_time_secs: 0.0,
            eta_secs: 0.0,
        }
    }
}

/// Accumulates the engine's `key=value` progress stream.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, the engine reports microseconds here too.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = (us / 1_000_000.0).max(0.0);
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

pub(crate) fn progress_report(
    state: &ProgressState,
    expected_duration_secs: Option<f64>,
    elapsed_secs: f64,
) -> JobProgress {
    let progress = match expected_duration_secs {
        Some(total) if total > 0.0 => (state.out_time_secs / total).clamp(0.0, 1.0),
        _ => 0.0,
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    JobProgress {
        stage: JobStage::Composing,
        progress: if state.complete { 1.0 } else { progress },
        out_time_secs: state.out_time_secs,
        eta_secs,
    }
}
