//! Pipmerge CLI: composite picture-in-picture videos from the command line.
//!
//! Usage:
//!   pipmerge compose [OPTIONS]   Composite an overlay onto a background
//!   pipmerge mask [OPTIONS]      Render a feathered circular mask to PNG
//!   pipmerge check               Check engine availability
//!   pipmerge config              Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pipmerge",
    about = "Picture-in-picture video compositing with feathered circular overlays",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load configuration from this file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite an overlay clip onto a background clip
    Compose {
        /// Background video URL
        #[arg(long)]
        background: String,

        /// Overlay video URL
        #[arg(long)]
        overlay: String,

        /// Overlay width as a fraction of its source width (0, 1]
        #[arg(long)]
        overlay_width: Option<f64>,

        /// Placement: topLeft, topRight, bottomLeft, bottomRight, center
        #[arg(long)]
        position: Option<String>,

        /// Mask feather width in pixels
        #[arg(long)]
        feather: Option<u32>,

        /// Mask strategy: procedural|raster
        #[arg(long)]
        mask: Option<String>,

        /// Upload the result to the configured sink instead of writing it locally
        #[arg(long)]
        upload: bool,

        /// Output file path (inline delivery)
        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,
    },

    /// Render a feathered circular mask to a grayscale PNG
    Mask {
        /// Side length of the square mask
        #[arg(long, default_value = "256")]
        size: u32,

        /// Feather width in pixels
        #[arg(long, default_value = "15")]
        feather: u32,

        /// Output PNG path
        #[arg(short, long, default_value = "mask.png")]
        output: PathBuf,
    },

    /// Check that the media engine binaries are usable
    Check,

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => pipmerge_common::AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => pipmerge_common::AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    pipmerge_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Compose {
            background,
            overlay,
            overlay_width,
            position,
            feather,
            mask,
            upload,
            output,
        } => {
            commands::compose::run(
                config,
                commands::compose::ComposeArgs {
                    background,
                    overlay,
                    overlay_width,
                    position,
                    feather,
                    mask,
                    upload,
                    output,
                },
            )
            .await
        }
        Commands::Mask {
            size,
            feather,
            output,
        } => commands::mask::run(size, feather, output),
        Commands::Check => commands::check::run(&config).await,
        Commands::Config => commands::config::run(&config),
    }
}
