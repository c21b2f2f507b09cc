//! Run one compositing job end to end.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use pipmerge_common::AppConfig;
use pipmerge_job_model::{DeliveryMode, JobRequest, MaskStrategy};
use pipmerge_render_engine::{Delivered, JobProgress, JobStage, Pipeline, ProgressCallback};
use tokio_util::sync::CancellationToken;

pub struct ComposeArgs {
    pub background: String,
    pub overlay: String,
    pub overlay_width: Option<f64>,
    pub position: Option<String>,
    pub feather: Option<u32>,
    pub mask: Option<String>,
    pub upload: bool,
    pub output: PathBuf,
}

pub async fn run(mut config: AppConfig, args: ComposeArgs) -> anyhow::Result<()> {
    if let Some(raw) = &args.mask {
        config.composite.mask_strategy = MaskStrategy::parse(raw)
            .ok_or_else(|| anyhow::anyhow!("Unknown mask strategy: {raw}. Use: procedural, raster"))?;
    }
    if args.upload {
        config.delivery.mode = DeliveryMode::Uploaded;
    }

    let pipeline = Pipeline::from_config(&config)?;

    let request = JobRequest {
        background_url: Some(args.background),
        overlay_url: Some(args.overlay),
        overlay_width: args.overlay_width,
        position: args.position,
        feather_radius: args.feather,
    };
    let job = pipeline.accept(&request)?;

    println!("Compositing job {}", job.id());
    println!("  Background: {}", job.background());
    println!("  Overlay: {}", job.overlay());
    println!(
        "  Placement: {} at {:.0}% width, {}px feather ({} mask)",
        job.position(),
        job.overlay_scale() * 100.0,
        job.feather_px(),
        config.composite.mask_strategy.as_str()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling job");
            on_interrupt.cancel();
        }
    });

    let progress_cb: ProgressCallback = Arc::new(|p: JobProgress| match p.stage {
        JobStage::Composing => {
            print!(
                "\r  Composing: {:.1}% ({:.1}s encoded, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.out_time_secs,
                p.eta_secs,
            );
            let _ = std::io::stdout().flush();
        }
        JobStage::Complete | JobStage::Failed => {}
        stage => println!("  {}...", stage.as_str()),
    });

    let delivered = match pipeline.run(&job, &cancel, Some(progress_cb)).await {
        Ok(delivered) => delivered,
        Err(e) => {
            println!();
            return Err(anyhow::anyhow!("Composition failed: {}", e.public_message()));
        }
    };

    match delivered {
        Delivered::Inline(bytes) => {
            if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&args.output, &bytes)?;
            println!(
                "\nComposite complete: {} ({} bytes)",
                args.output.display(),
                bytes.len()
            );
        }
        Delivered::Uploaded { url } => {
            println!("\nComposite uploaded: {url}");
        }
    }

    Ok(())
}
