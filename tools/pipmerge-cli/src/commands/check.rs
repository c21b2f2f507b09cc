//! Check engine availability.

use pipmerge_common::AppConfig;
use pipmerge_render_engine::CompositionExecutor;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Pipmerge System Check");
    println!("{}", "=".repeat(50));

    let executor = CompositionExecutor::new(&config.engine);
    let ffmpeg_ok = executor.is_available().await;
    report(ffmpeg_ok, "ffmpeg", &config.engine.ffmpeg_path.display().to_string());

    let ffprobe_ok = tokio::process::Command::new(&config.engine.ffprobe_path)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);
    report(
        ffprobe_ok,
        "ffprobe",
        &config.engine.ffprobe_path.display().to_string(),
    );

    println!("[OK] Workspace root: {}", config.workspace.root.display());
    println!(
        "[OK] Delivery: {} / mask: {}",
        config.delivery.mode.as_str(),
        config.composite.mask_strategy.as_str()
    );

    println!();
    if ffmpeg_ok {
        if !ffprobe_ok {
            println!("ffprobe is missing: background audio will be dropped, output length is uncapped and raster masks are unavailable.");
        }
        println!("Pipmerge is ready.");
    } else {
        println!("ffmpeg is required. Install it or set engine.ffmpeg_path in the config.");
    }

    Ok(())
}

fn report(ok: bool, name: &str, path: &str) {
    if ok {
        println!("[OK] {name}: {path}");
    } else {
        println!("[MISSING] {name}: {path}");
    }
}
