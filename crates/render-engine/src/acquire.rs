//! Asset acquisition: concurrent source downloads into a workspace.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use pipmerge_common::config::FetchConfig;
use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_job_model::Job;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::workspace::{Artifact, Workspace};

/// Paths of both downloaded sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub background: PathBuf,
    pub overlay: PathBuf,
}

/// Downloads job sources over HTTP(S).
///
/// No retries happen here; a failed transfer fails the job.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    pub fn new(config: &FetchConfig) -> PipmergeResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10));

        if config.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        }
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }

        let client = builder
            .build()
            .map_err(|e| PipmergeError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download both sources concurrently.
    ///
    /// Returns once both files are complete. If either transfer fails the
    /// other is dropped mid-flight and the error names the failing URL.
    /// Firing `cancel` aborts both transfers with [`PipmergeError::Cancelled`].
    pub async fn fetch(
        &self,
        job: &Job,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> PipmergeResult<AssetPaths> {
        let background = self.download(job.background(), workspace, Artifact::Background);
        let overlay = self.download(job.overlay(), workspace, Artifact::Overlay);

        let started = std::time::Instant::now();
        let (background, overlay) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %workspace.job_id(), "Acquisition cancelled");
                return Err(PipmergeError::Cancelled);
            }
            joined = async { tokio::try_join!(background, overlay) } => joined?,
        };

        tracing::info!(
            job_id = %workspace.job_id(),
            elapsed_ms = started.elapsed().as_millis(),
            "Sources acquired"
        );

        Ok(AssetPaths {
            background,
            overlay,
        })
    }

    async fn download(
        &self,
        url: &Url,
        workspace: &Workspace,
        artifact: Artifact,
    ) -> PipmergeResult<PathBuf> {
        let partial = workspace.partial_path(artifact);
        let dest = workspace.artifact_path(artifact);

        match self.stream_to(url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &dest).await.map_err(|e| {
                    PipmergeError::workspace(format!("failed to finalize {}: {e}", dest.display()))
                })?;
                tracing::debug!(
                    url = %url,
                    artifact = artifact.file_name(),
                    bytes,
                    "Download complete"
                );
                Ok(dest)
            }
            Err(err) => {
                // Never leave a half-written file behind.
                let _ = tokio::fs::remove_file(&partial).await;
                tracing::warn!(url = %url, error = %err, "Download failed");
                Err(err)
            }
        }
    }

    async fn stream_to(&self, url: &Url, partial: &Path) -> PipmergeResult<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipmergeError::download(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipmergeError::download(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let mut file = tokio::fs::File::create(partial).await.map_err(|e| {
            PipmergeError::workspace(format!("failed to create {}: {e}", partial.display()))
        })?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipmergeError::download(url.as_str(), e))?;
            file.write_all(&chunk).await.map_err(|e| {
                PipmergeError::workspace(format!("failed to write {}: {e}", partial.display()))
            })?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(PipmergeError::download(url.as_str(), "empty response body"));
        }
        Ok(written)
    }
}
