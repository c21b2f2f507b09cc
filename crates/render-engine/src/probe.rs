//! Source media probing via `ffprobe`.

use std::path::{Path, PathBuf};

use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_graph::FrameDims;
use serde::Deserialize;
use tokio::process::Command;

/// What the pipeline needs to know about one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// First video stream's frame size.
    pub dims: FrameDims,

    /// Container duration, when reported.
    pub duration_secs: Option<f64>,

    /// Codec name of the first audio stream, if there is one.
    pub audio_codec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_output(raw: &str) -> PipmergeResult<MediaInfo> {
    let output: ProbeOutput = serde_json::from_str(raw)?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PipmergeError::unsupported("source has no video stream"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(PipmergeError::unsupported(
                "source video stream reports no frame size",
            ))
        }
    };

    let duration_secs = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let audio_codec = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.codec_name.clone());

    Ok(MediaInfo {
        dims: FrameDims::new(width, height),
        duration_secs,
        audio_codec,
    })
}

/// Runs the configured `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
}

impl MediaProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    pub async fn probe(&self, path: &Path) -> PipmergeResult<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PipmergeError::unsupported(format!(
                    "failed to start {}: {e}",
                    self.ffprobe.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipmergeError::unsupported(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&raw)
    }
}
