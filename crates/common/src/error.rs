//! Error types shared across pipmerge crates.

use pipmerge_job_model::JobError;

/// Top-level error type for pipeline operations.
///
/// Every variant is fatal for the job that raised it; nothing here is
/// retried by the pipeline itself.
#[derive(Debug, thiserror::Error)]
pub enum PipmergeError {
    #[error("Invalid input: {message}")]
    InputValidation { message: String },

    #[error("Failed to download {url}: {cause}")]
    DownloadFailure { url: String, cause: String },

    #[error("Filter graph construction error: {message}")]
    GraphConstruction { message: String },

    #[error("Composition failed: {diagnostics}")]
    GraphExecution { diagnostics: String },

    #[error("Storage upload failed: {message}")]
    StorageUpload { message: String },

    #[error("Workspace error: {message}")]
    Workspace { message: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PipmergeError.
pub type PipmergeResult<T> = Result<T, PipmergeError>;

impl From<JobError> for PipmergeError {
    fn from(err: JobError) -> Self {
        Self::InputValidation {
            message: err.to_string(),
        }
    }
}

impl PipmergeError {
    pub fn input_validation(msg: impl Into<String>) -> Self {
        Self::InputValidation {
            message: msg.into(),
        }
    }

    pub fn download(url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::DownloadFailure {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    pub fn graph_construction(msg: impl Into<String>) -> Self {
        Self::GraphConstruction {
            message: msg.into(),
        }
    }

    pub fn graph_execution(diagnostics: impl Into<String>) -> Self {
        Self::GraphExecution {
            diagnostics: diagnostics.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUpload {
            message: msg.into(),
        }
    }

    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Short machine-readable name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation { .. } => "input_validation",
            Self::DownloadFailure { .. } => "download_failure",
            Self::GraphConstruction { .. } => "graph_construction",
            Self::GraphExecution { .. } => "graph_execution",
            Self::StorageUpload { .. } => "storage_upload",
            Self::Workspace { .. } => "workspace",
            Self::Cancelled => "cancelled",
            Self::Config { .. } => "config",
            Self::Unsupported { .. } => "unsupported",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// HTTP-style status for the wire response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputValidation { .. } => 400,
            _ => 500,
        }
    }

    /// Message safe to show to the submitter.
    ///
    /// Local filesystem details (workspace paths, raw I/O errors) never
    /// appear here.
    pub fn public_message(&self) -> String {
        match self {
            Self::InputValidation { .. }
            | Self::DownloadFailure { .. }
            | Self::GraphExecution { .. }
            | Self::StorageUpload { .. }
            | Self::Cancelled
            | Self::Unsupported { .. } => self.to_string(),
            Self::GraphConstruction { .. } => {
                "Internal error while building the filter graph".to_string()
            }
            Self::Workspace { .. } | Self::Io(_) => {
                "Internal error while preparing job storage".to_string()
            }
            Self::Config { .. } => "Service is misconfigured".to_string(),
            Self::Json(_) | Self::Other(_) => "Internal server error".to_string(),
        }
    }
}
