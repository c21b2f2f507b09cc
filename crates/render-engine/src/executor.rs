//! Composition executor: one engine invocation per job.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use pipmerge_common::config::EngineConfig;
use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_graph::{GraphPlan, PlanInput};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::acquire::AssetPaths;
use crate::probe::MediaInfo;
use crate::progress::{progress_report, ProgressCallback, ProgressState};
use crate::workspace::redact_path;

/// Audio codecs the MP4 muxer accepts as a stream copy.
const MP4_AUDIO_CODECS: &[&str] = &["aac", "mp3", "ac3", "eac3", "alac", "opus", "flac"];

/// Engine stderr lines kept in failure diagnostics.
const DIAGNOSTIC_LINES: usize = 20;

/// Warn when encoded output time has not advanced for this long.
const STALL_WARNING: Duration = Duration::from_secs(10);

/// How the background's audio reaches the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPlan {
    /// Copy the first audio stream unmodified.
    Copy { codec: String },
    /// Background audio cannot be copied into MP4, or its codec is unknown,
    /// and is left out.
    Drop { reason: String },
    /// Background has no audio.
    Absent,
}

impl AudioPlan {
    /// Decide from the background's probe result, if probing succeeded.
    pub fn for_background(info: Option<&MediaInfo>) -> Self {
        let Some(info) = info else {
            return AudioPlan::Drop {
                reason: "background was not probed, audio codec unknown".to_string(),
            };
        };
        match info.audio_codec.as_deref() {
            None => AudioPlan::Absent,
            Some(codec) if MP4_AUDIO_CODECS.contains(&codec) => AudioPlan::Copy {
                codec: codec.to_string(),
            },
            Some(codec) => AudioPlan::Drop {
                reason: format!("audio codec `{codec}` cannot be stream-copied into MP4"),
            },
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            AudioPlan::Copy { .. } => strings(&["-map", "0:a:0", "-c:a", "copy"]),
            AudioPlan::Drop { .. } | AudioPlan::Absent => strings(&["-an"]),
        }
    }
}

/// Everything one engine invocation consumes.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub plan: &'a GraphPlan,
    pub assets: &'a AssetPaths,
    /// Rendered mask image, required when the plan has a mask input.
    pub mask: Option<&'a Path>,
    pub output: &'a Path,
    pub audio: AudioPlan,
    /// Background duration. Caps the output length and drives progress
    /// fractions.
    pub expected_duration_secs: Option<f64>,
}

/// Build the engine argument list for `invocation`.
pub fn build_args(invocation: &Invocation<'_>) -> PipmergeResult<Vec<String>> {
    let mut args = strings(&[
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]);

    for input in &invocation.plan.inputs {
        let path = match input {
            PlanInput::Background => invocation.assets.background.as_path(),
            PlanInput::Overlay => invocation.assets.overlay.as_path(),
            PlanInput::Mask => invocation.mask.ok_or_else(|| {
                PipmergeError::graph_construction("plan needs a mask input but none was rendered")
            })?,
        };
        args.push("-i".to_string());
        args.push(path.display().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(invocation.plan.to_filter_complex());
    args.push("-map".to_string());
    args.push(format!("[{}]", pin_name(invocation.plan)?));
    args.extend(invocation.audio.args());
    args.extend(strings(&[
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-crf",
        "23",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ]));
    // The overlay filter outlives its main input when the overlay is longer.
    if let Some(duration) = invocation
        .expected_duration_secs
        .filter(|d| d.is_finite() && *d > 0.0)
    {
        args.push("-t".to_string());
        args.push(format!("{duration:.3}"));
    }
    args.push(invocation.output.display().to_string());

    Ok(args)
}

fn pin_name(plan: &GraphPlan) -> PipmergeResult<&str> {
    match &plan.output {
        pipmerge_graph::Pin::Label(name) => Ok(name.as_str()),
        pipmerge_graph::Pin::Input(_) => Err(PipmergeError::graph_construction(
            "plan output must be a labelled pin",
        )),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Last lines of engine stderr with the workspace path scrubbed out.
pub fn engine_diagnostics(stderr: &str, workspace_dir: &Path) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    let excerpt = lines[start..].join("\n");

    if excerpt.is_empty() {
        "engine produced no diagnostics".to_string()
    } else {
        redact_path(&excerpt, workspace_dir)
    }
}

/// Runs the media engine. Binary paths are injected at construction.
#[derive(Debug, Clone)]
pub struct CompositionExecutor {
    ffmpeg: PathBuf,
}

impl CompositionExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Whether the configured engine binary starts.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run the engine once and wait for it to exit.
    ///
    /// `workspace_dir` is scrubbed from any diagnostics returned. Firing
    /// `cancel` kills the engine process.
    pub async fn execute(
        &self,
        invocation: &Invocation<'_>,
        workspace_dir: &Path,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> PipmergeResult<()> {
        if let AudioPlan::Drop { reason } = &invocation.audio {
            tracing::warn!(reason = %reason, "Dropping background audio");
        }

        let args = build_args(invocation)?;
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipmergeError::unsupported(format!(
                    "failed to start {}: {e}",
                    self.ffmpeg.display()
                ))
            })?;

        let start = Instant::now();
        tracing::info!(
            pid = child.id(),
            args_len = args.len(),
            audio = ?invocation.audio,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipmergeError::graph_execution("failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipmergeError::graph_execution("failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so the engine never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = Vec::new();
            match stderr.read_to_end(&mut output).await {
                Ok(_) => String::from_utf8_lossy(&output).into_owned(),
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = Instant::now();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(elapsed_secs = start.elapsed().as_secs_f64(), "Killing ffmpeg on cancellation");
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill ffmpeg");
                    }
                    stderr_task.abort();
                    return Err(PipmergeError::Cancelled);
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed reading ffmpeg progress");
                    break;
                }
            };

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if state.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = state.out_time_secs;
                last_progress_wall = Instant::now();
            }
            if let Some(cb) = progress {
                cb(progress_report(
                    &state,
                    invocation.expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed() >= STALL_WARNING {
                tracing::warn!(
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = Instant::now();
            }
        }

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill ffmpeg");
            }
            stderr_task.abort();
            return Err(PipmergeError::Cancelled);
        };
        let status = status.map_err(|e| {
            PipmergeError::graph_execution(format!("failed to wait on ffmpeg: {e}"))
        })?;

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            let diagnostics = engine_diagnostics(&stderr_output, workspace_dir);
            tracing::error!(
                status = %status,
                elapsed_secs = start.elapsed().as_secs_f64(),
                diagnostics = %diagnostics,
                "ffmpeg composition failed"
            );
            return Err(PipmergeError::graph_execution(format!(
                "engine exited with {status}: {diagnostics}"
            )));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            out_time_secs = state.out_time_secs,
            "ffmpeg composition finished"
        );
        Ok(())
    }
}
