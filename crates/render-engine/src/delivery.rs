//! Result delivery: inline bytes or an uploaded locator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pipmerge_common::config::{FetchConfig, SinkConfig};
use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_job_model::DeliveryMode;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::workspace::{Artifact, Workspace};

/// Durable object storage, shared by all jobs.
///
/// Implementations only ever create objects; a key is written once and
/// never read back or replaced by the pipeline.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Store `bytes` under `key` and return a locator for the object.
    async fn put(&self, key: &str, bytes: Bytes) -> PipmergeResult<String>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Writes objects into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    public_base_url: Option<String>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BlobSink for DirectorySink {
    async fn put(&self, key: &str, bytes: Bytes) -> PipmergeResult<String> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PipmergeError::storage(format!("cannot prepare object directory: {e}")))?;

        // Objects appear under their key only once fully written.
        let path = self.dir.join(key);
        let partial = self.dir.join(format!(".{key}.part"));
        let written = write_then_link(&partial, &path, &bytes).await;
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial object");
            }
        }
        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                PipmergeError::storage(format!("object `{key}` already exists"))
            }
            _ => PipmergeError::storage(format!("cannot write object `{key}`: {e}")),
        })?;

        match &self.public_base_url {
            Some(base) => Ok(join_locator(base, key)),
            None => {
                let absolute = tokio::fs::canonicalize(&path).await?;
                Url::from_file_path(&absolute)
                    .map(String::from)
                    .map_err(|_| PipmergeError::storage(format!("no file URL for object `{key}`")))
            }
        }
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// PUTs objects to an HTTP object store.
#[derive(Debug, Clone)]
pub struct HttpPutSink {
    client: reqwest::Client,
    put_base_url: String,
    public_base_url: String,
}

impl HttpPutSink {
    pub fn new(
        client: reqwest::Client,
        put_base_url: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        let put_base_url = put_base_url.into();
        let public_base_url = public_base_url.unwrap_or_else(|| put_base_url.clone());
        Self {
            client,
            put_base_url,
            public_base_url,
        }
    }
}

#[async_trait]
impl BlobSink for HttpPutSink {
    async fn put(&self, key: &str, bytes: Bytes) -> PipmergeResult<String> {
        validate_key(key)?;
        let target = join_locator(&self.put_base_url, key);
        let size = bytes.len();

        let response = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PipmergeError::storage(format!("upload of `{key}` failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipmergeError::storage(format!(
                "object store rejected `{key}` with HTTP {status}"
            )));
        }

        tracing::debug!(key, size, "Object uploaded");
        Ok(join_locator(&self.public_base_url, key))
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn validate_key(key: &str) -> PipmergeResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(PipmergeError::storage(format!("invalid object key `{key}`")))
    }
}

async fn write_then_link(partial: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(partial)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    // A hard link refuses to replace an existing object, unlike rename.
    tokio::fs::hard_link(partial, path).await
}

fn join_locator(base: &str, key: &str) -> String {
    format!("{}/{key}", base.trim_end_matches('/'))
}

/// Build the configured sink.
pub fn sink_from_config(
    config: &SinkConfig,
    fetch: &FetchConfig,
) -> PipmergeResult<Arc<dyn BlobSink>> {
    match config {
        SinkConfig::Directory {
            path,
            public_base_url,
        } => Ok(Arc::new(DirectorySink::new(path.clone(), public_base_url.clone()))),
        SinkConfig::Http {
            put_base_url,
            public_base_url,
        } => {
            Url::parse(put_base_url).map_err(|e| {
                PipmergeError::config(format!("delivery.sink.put_base_url is not a URL: {e}"))
            })?;

            let mut builder = reqwest::Client::builder().user_agent(&fetch.user_agent);
            if fetch.connect_timeout_secs > 0 {
                builder = builder.connect_timeout(Duration::from_secs(fetch.connect_timeout_secs));
            }
            if fetch.request_timeout_secs > 0 {
                builder = builder.timeout(Duration::from_secs(fetch.request_timeout_secs));
            }
            let client = builder
                .build()
                .map_err(|e| PipmergeError::config(format!("failed to build HTTP client: {e}")))?;

            Ok(Arc::new(HttpPutSink::new(
                client,
                put_base_url.clone(),
                public_base_url.clone(),
            )))
        }
    }
}

/// Delivered job result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// The composited video itself.
    Inline(Bytes),
    /// Locator of the uploaded video.
    Uploaded { url: String },
}

/// Delivers a workspace's output according to the deployment's mode.
#[derive(Clone)]
pub struct Delivery {
    mode: DeliveryMode,
    sink: Option<Arc<dyn BlobSink>>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("mode", &self.mode)
            .field("sink", &self.sink.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl Delivery {
    pub fn inline() -> Self {
        Self {
            mode: DeliveryMode::Inline,
            sink: None,
        }
    }

    pub fn uploaded(sink: Arc<dyn BlobSink>) -> Self {
        Self {
            mode: DeliveryMode::Uploaded,
            sink: Some(sink),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Deliver the output artifact of `workspace`.
    ///
    /// Runs only once the output exists and is non-empty.
    pub async fn deliver(&self, workspace: &Workspace) -> PipmergeResult<Delivered> {
        let size = workspace.output_ready().await?;
        let bytes = Bytes::from(tokio::fs::read(workspace.artifact_path(Artifact::Output)).await?);

        match (self.mode, &self.sink) {
            (DeliveryMode::Inline, _) => {
                tracing::info!(job_id = %workspace.job_id(), size, "Returning output inline");
                Ok(Delivered::Inline(bytes))
            }
            (DeliveryMode::Uploaded, Some(sink)) => {
                let key = format!("{}.mp4", workspace.job_id());
                let url = sink.put(&key, bytes).await?;
                tracing::info!(
                    job_id = %workspace.job_id(),
                    sink = sink.name(),
                    size,
                    url = %url,
                    "Output uploaded"
                );
                Ok(Delivered::Uploaded { url })
            }
            (DeliveryMode::Uploaded, None) => Err(PipmergeError::config(
                "uploaded delivery requires a blob sink",
            )),
        }
    }
}
