//! Application configuration.

use pipmerge_job_model::{CompositeDefaults, DeliveryMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipmergeError, PipmergeResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where job workspaces are created.
    pub workspace: WorkspaceConfig,

    /// External media engine binaries.
    pub engine: EngineConfig,

    /// Source download settings.
    pub fetch: FetchConfig,

    /// Defaults for optional request fields and the mask strategy.
    pub composite: CompositeDefaults,

    /// Result delivery.
    pub delivery: DeliveryConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Job workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for per-job workspaces.
    pub root: PathBuf,
}

/// Media engine binaries, injected into the executor at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path or command name of `ffmpeg`.
    pub ffmpeg_path: PathBuf,

    /// Path or command name of `ffprobe`.
    pub ffprobe_path: PathBuf,
}

/// HTTP download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout, including the body transfer.
    pub request_timeout_secs: u64,

    /// User-Agent sent with downloads and uploads.
    pub user_agent: String,
}

/// Result delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Inline bytes or uploaded locator.
    pub mode: DeliveryMode,

    /// Blob sink used in uploaded mode.
    pub sink: Option<SinkConfig>,
}

/// Durable blob sink for uploaded delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Objects are written into a local (or mounted) directory.
    Directory {
        path: PathBuf,
        /// Base URL under which written objects are served, if any.
        #[serde(default)]
        public_base_url: Option<String>,
    },
    /// Objects are PUT to an HTTP object store.
    Http {
        put_base_url: String,
        /// Base URL returned to callers; defaults to `put_base_url`.
        #[serde(default)]
        public_base_url: Option<String>,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pipmerge=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("pipmerge"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
            user_agent: concat!("pipmerge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> PipmergeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> PipmergeResult<()> {
        pipmerge_job_model::validate_overlay_scale(self.composite.overlay_scale)
            .map_err(|e| PipmergeError::config(format!("composite.overlay_scale: {e}")))?;

        if self.delivery.mode == DeliveryMode::Uploaded && self.delivery.sink.is_none() {
            return Err(PipmergeError::config(
                "delivery.mode is `uploaded` but no delivery.sink is configured",
            ));
        }

        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("pipmerge").join("config.json")
}
