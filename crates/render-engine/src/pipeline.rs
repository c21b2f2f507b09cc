//! The compositing pipeline: one job in, one video out.
//!
//! ```text
//! JobRequest ── validate ── Workspace::open
//!                                │
//!                 ┌── download background ──┐
//!                 └── download overlay ─────┴── probe ── plan ── execute ── deliver
//!                                                                             │
//!                                                            Workspace::close (always)
//! ```

use std::path::{Path, PathBuf};

use pipmerge_common::config::AppConfig;
use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_graph::{resolve, GraphBuilder};
use pipmerge_job_model::{CompositeDefaults, Job, JobRequest};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::acquire::AssetFetcher;
use crate::delivery::{sink_from_config, Delivered, Delivery};
use crate::executor::{AudioPlan, CompositionExecutor, Invocation};
use crate::probe::{MediaInfo, MediaProbe};
use crate::progress::{JobProgress, JobStage, ProgressCallback};
use crate::workspace::{Artifact, Workspace};

/// A configured pipeline. Holds no per-job state, so one instance serves
/// any number of concurrent jobs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    workspace_root: PathBuf,
    defaults: CompositeDefaults,
    fetcher: AssetFetcher,
    probe: MediaProbe,
    builder: GraphBuilder,
    executor: CompositionExecutor,
    delivery: Delivery,
}

impl Pipeline {
    pub fn from_config(config: &AppConfig) -> PipmergeResult<Self> {
        config.validate()?;

        let delivery = match (config.delivery.mode, &config.delivery.sink) {
            (pipmerge_job_model::DeliveryMode::Inline, _) => Delivery::inline(),
            (pipmerge_job_model::DeliveryMode::Uploaded, Some(sink)) => {
                Delivery::uploaded(sink_from_config(sink, &config.fetch)?)
            }
            (pipmerge_job_model::DeliveryMode::Uploaded, None) => {
                return Err(PipmergeError::config(
                    "uploaded delivery requires delivery.sink",
                ))
            }
        };

        Ok(Self {
            workspace_root: config.workspace.root.clone(),
            defaults: config.composite.clone(),
            fetcher: AssetFetcher::new(&config.fetch)?,
            probe: MediaProbe::new(config.engine.ffprobe_path.clone()),
            builder: GraphBuilder::new(config.composite.margin_px, config.composite.mask_strategy),
            executor: CompositionExecutor::new(&config.engine),
            delivery,
        })
    }

    /// Replace the delivery strategy.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn defaults(&self) -> &CompositeDefaults {
        &self.defaults
    }

    pub fn executor(&self) -> &CompositionExecutor {
        &self.executor
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Validate a request. No workspace exists yet if this fails.
    pub fn accept(&self, request: &JobRequest) -> PipmergeResult<Job> {
        let job = Job::from_request(request, &self.defaults)?;
        if job.position_defaulted() {
            tracing::warn!(
                job_id = %job.id(),
                requested = request.position.as_deref().unwrap_or_default(),
                fallback = %job.position(),
                "Unknown position, using deployment default"
            );
        }
        Ok(job)
    }

    /// Validate and run a request.
    pub async fn submit(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> PipmergeResult<Delivered> {
        let job = self.accept(request)?;
        self.run(&job, cancel, progress).await
    }

    /// Run an accepted job end to end.
    ///
    /// The job's workspace is removed before this returns, whatever the
    /// outcome. If the returned future is dropped early the workspace is
    /// removed by its `Drop` instead.
    pub async fn run(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> PipmergeResult<Delivered> {
        let span = tracing::info_span!("job", job_id = %job.id());
        async move {
            let started = std::time::Instant::now();
            tracing::info!(
                background = %job.background(),
                overlay = %job.overlay(),
                position = %job.position(),
                scale = job.overlay_scale(),
                feather_px = job.feather_px(),
                strategy = self.builder.strategy().as_str(),
                delivery = self.delivery.mode().as_str(),
                "Starting job"
            );
            report(progress.as_ref(), JobProgress::stage(JobStage::Preparing));

            let mut workspace = Workspace::open(&self.workspace_root, job.id()).await?;
            let result = self
                .run_in_workspace(job, &workspace, cancel, progress.as_ref())
                .await;
            workspace.close().await;

            match &result {
                Ok(_) => {
                    report(progress.as_ref(), JobProgress::stage(JobStage::Complete));
                    tracing::info!(
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "Job finished"
                    );
                }
                Err(err) => {
                    report(progress.as_ref(), JobProgress::stage(JobStage::Failed));
                    tracing::warn!(
                        kind = err.kind(),
                        error = %err,
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "Job failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_in_workspace(
        &self,
        job: &Job,
        workspace: &Workspace,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> PipmergeResult<Delivered> {
        report(progress, JobProgress::stage(JobStage::Downloading));
        let assets = self.fetcher.fetch(job, workspace, cancel).await?;
        if cancel.is_cancelled() {
            return Err(PipmergeError::Cancelled);
        }

        report(progress, JobProgress::stage(JobStage::Planning));
        let (background_info, overlay_info) = tokio::join!(
            self.probe_or_warn(&assets.background, "background"),
            self.probe_or_warn(&assets.overlay, "overlay"),
        );

        let plan = self
            .builder
            .build(job, overlay_info.as_ref().map(|info| info.dims))?;

        if let (Some(bg), Some(ov)) = (&background_info, &overlay_info) {
            let placement = resolve(job.position(), self.defaults.margin_px);
            let scaled = ov.dims.scaled(job.overlay_scale());
            if !placement.fits(bg.dims, scaled) {
                tracing::warn!(
                    background = ?bg.dims,
                    overlay = ?scaled,
                    position = %job.position(),
                    "Scaled overlay extends past the background frame and will be clipped"
                );
            }
        }

        let mask_path = match &plan.raster_mask {
            Some(mask) => {
                let path = workspace.artifact_path(Artifact::Mask);
                tokio::fs::write(&path, mask.to_png()?).await.map_err(|e| {
                    PipmergeError::workspace(format!("failed to write mask {}: {e}", path.display()))
                })?;
                Some(path)
            }
            None => None,
        };

        report(progress, JobProgress::stage(JobStage::Composing));
        let output = workspace.artifact_path(Artifact::Output);
        let invocation = Invocation {
            plan: &plan,
            assets: &assets,
            mask: mask_path.as_deref(),
            output: &output,
            audio: AudioPlan::for_background(background_info.as_ref()),
            expected_duration_secs: background_info.as_ref().and_then(|i| i.duration_secs),
        };
        self.executor
            .execute(&invocation, workspace.dir(), cancel, progress)
            .await?;

        report(progress, JobProgress::stage(JobStage::Delivering));
        self.delivery.deliver(workspace).await
    }

    async fn probe_or_warn(&self, path: &Path, source: &'static str) -> Option<MediaInfo> {
        match self.probe.probe(path).await {
            Ok(info) => {
                tracing::debug!(
                    source,
                    width = info.dims.width,
                    height = info.dims.height,
                    duration_secs = info.duration_secs,
                    audio = info.audio_codec.as_deref(),
                    "Probed source"
                );
                Some(info)
            }
            Err(err) => {
                tracing::warn!(source, error = %err, "Probe failed");
                None
            }
        }
    }
}

fn report(progress: Option<&ProgressCallback>, update: JobProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}
