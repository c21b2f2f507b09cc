//! Job-scoped workspaces.
//!
//! Each job owns one directory under the configured root, named after its
//! [`JobId`]. The directory holds at most the background, overlay and output
//! files plus an optional raster mask, and is removed when the job ends:
//! explicitly through [`Workspace::close`], or by `Drop` if the job future is
//! abandoned mid-flight.

use std::path::{Path, PathBuf};

use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_job_model::JobId;

/// Marker substituted for the workspace path in user-visible text.
const REDACTED: &str = "<workspace>";

/// Named files a workspace may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Background,
    Overlay,
    Output,
    Mask,
}

impl Artifact {
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Background => "background.mp4",
            Artifact::Overlay => "overlay.mp4",
            Artifact::Output => "output.mp4",
            Artifact::Mask => "mask.png",
        }
    }
}

/// Exclusively owned storage scope for one job.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    dir: PathBuf,
    closed: bool,
}

impl Workspace {
    /// Create the workspace directory for `job_id` under `root`.
    ///
    /// Fails if the directory already exists, so two jobs can never share
    /// one.
    pub async fn open(root: &Path, job_id: JobId) -> PipmergeResult<Self> {
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            PipmergeError::workspace(format!(
                "failed to create workspace root {}: {e}",
                root.display()
            ))
        })?;

        let dir = root.join(format!("job-{job_id}"));
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            PipmergeError::workspace(format!(
                "failed to create workspace {}: {e}",
                dir.display()
            ))
        })?;

        tracing::debug!(job_id = %job_id, dir = %dir.display(), "Workspace opened");

        Ok(Self {
            job_id,
            dir,
            closed: false,
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Final path of an artifact.
    pub fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(artifact.file_name())
    }

    /// Scratch path an artifact is written to before it becomes valid.
    pub fn partial_path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(format!("{}.part", artifact.file_name()))
    }

    /// Size of the output artifact, failing if it is missing or empty.
    pub async fn output_ready(&self) -> PipmergeResult<u64> {
        let path = self.artifact_path(Artifact::Output);
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        if size == 0 {
            return Err(PipmergeError::graph_execution(
                "engine finished without producing an output video",
            ));
        }
        Ok(size)
    }

    /// Replace every occurrence of the workspace path in `text`.
    pub fn redact(&self, text: &str) -> String {
        redact_path(text, &self.dir)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Safe to call more than once. Failures are logged, never returned: a
    /// job's outcome does not depend on teardown.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!(job_id = %self.job_id, "Workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                job_id = %self.job_id,
                dir = %self.dir.display(),
                error = %e,
                "Failed to remove workspace"
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    job_id = %self.job_id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove abandoned workspace"
                );
            }
        }
    }
}

/// Replace `path` in `text` with a fixed marker.
pub fn redact_path(text: &str, path: &Path) -> String {
    let needle = path.display().to_string();
    if needle.is_empty() {
        return text.to_string();
    }
    text.replace(&needle, REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_unique_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut a = Workspace::open(root.path(), JobId::new()).await.unwrap();
        let mut b = Workspace::open(root.path(), JobId::new()).await.unwrap();

        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert!(b.dir().is_dir());

        a.close().await;
        b.close().await;
    }

    #[tokio::test]
    async fn test_open_same_job_twice_fails() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::new();
        let _first = Workspace::open(root.path(), id).await.unwrap();
        let second = Workspace::open(root.path(), id).await;
        assert!(matches!(second, Err(PipmergeError::Workspace { .. })));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_removes_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::open(root.path(), JobId::new()).await.unwrap();
        for artifact in [Artifact::Background, Artifact::Overlay, Artifact::Output, Artifact::Mask] {
            tokio::fs::write(workspace.artifact_path(artifact), b"data")
                .await
                .unwrap();
        }
        tokio::fs::write(workspace.partial_path(Artifact::Overlay), b"half")
            .await
            .unwrap();
        let dir = workspace.dir().to_path_buf();

        workspace.close().await;
        assert!(!dir.exists());
        assert!(workspace.is_closed());

        workspace.close().await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_unclosed_workspace() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(root.path(), JobId::new()).await.unwrap();
        let dir = workspace.dir().to_path_buf();
        tokio::fs::write(workspace.artifact_path(Artifact::Output), b"x")
            .await
            .unwrap();

        drop(workspace);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_output_ready_rejects_missing_and_empty() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::open(root.path(), JobId::new()).await.unwrap();

        assert!(workspace.output_ready().await.is_err());

        tokio::fs::write(workspace.artifact_path(Artifact::Output), b"")
            .await
            .unwrap();
        assert!(workspace.output_ready().await.is_err());

        tokio::fs::write(workspace.artifact_path(Artifact::Output), b"mp4")
            .await
            .unwrap();
        assert_eq!(workspace.output_ready().await.unwrap(), 3);

        workspace.close().await;
    }

    #[tokio::test]
    async fn test_redact_hides_workspace_path() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::open(root.path(), JobId::new()).await.unwrap();
        let message = format!(
            "{}: Invalid data found when processing input",
            workspace.artifact_path(Artifact::Overlay).display()
        );

        let redacted = workspace.redact(&message);
        assert_eq!(
            redacted,
            "<workspace>/overlay.mp4: Invalid data found when processing input"
        );
        workspace.close().await;
    }
}
