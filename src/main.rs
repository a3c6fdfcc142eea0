use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use multiply_compositor::{
    composition::{InputFile, InputSelection, MultiplyCompositor},
    config::Config,
    engine::FfmpegLoader,
    status::JobStatus,
};

#[derive(Parser)]
#[command(
    name = "multiply-compositor",
    version,
    about = "Blend a looping GIF over a video in multiply mode",
    long_about = "Multiply-Compositor loops a GIF overlay over the full length of a video, blends the two in multiply mode and writes an H.264 MP4 that keeps the video's original audio."
)]
struct Cli {
    /// Primary video file
    #[arg(long, required_unless_present = "dump_config")]
    video: Option<PathBuf>,

    /// GIF overlay file
    #[arg(long, required_unless_present = "dump_config")]
    overlay: Option<PathBuf>,

    /// Directory for the finished file (overrides the configuration)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print every status snapshot as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", Config::default().to_toml_string()?);
        return Ok(());
    }

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Multiply-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }
    config.validate()?;

    let video_path = cli.video.context("--video is required")?;
    let overlay_path = cli.overlay.context("--overlay is required")?;
    info!("Video: {:?}", video_path);
    info!("Overlay: {:?}", overlay_path);
    info!("Output directory: {:?}", config.output.directory);

    let selection = InputSelection::new()
        .with_video(
            InputFile::from_path(&video_path)
                .await
                .with_context(|| format!("Failed to read video {:?}", video_path))?,
        )
        .with_overlay(
            InputFile::from_path(&overlay_path)
                .await
                .with_context(|| format!("Failed to read overlay {:?}", overlay_path))?,
        );

    let compositor = MultiplyCompositor::new();
    let reporter = spawn_status_reporter(compositor.subscribe(), cli.json);

    let outcome = async {
        compositor
            .initialize(&FfmpegLoader::new(config.engine.clone()))
            .await?;
        compositor.run(&selection).await
    }
    .await;

    // Closing the status channel ends the reporter after its last snapshot
    compositor.shutdown();
    drop(compositor);
    let _ = reporter.await;

    let artifact = match outcome {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("{}", e.user_message());
            anyhow::bail!(e.user_message());
        }
    };

    let path = artifact
        .write_to(&config.output.directory)
        .await
        .with_context(|| format!("Failed to write {:?}", config.output.directory))?;

    info!("Composition complete! Output saved to: {:?}", path);
    Ok(())
}

/// Log every status transition, optionally mirroring it to stdout as JSON
fn spawn_status_reporter(
    mut updates: tokio::sync::watch::Receiver<JobStatus>,
    json: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_percent = None;
        loop {
            let status = updates.borrow_and_update().clone();
            if json {
                match serde_json::to_string(&status) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to encode status: {}", e),
                }
            }

            match &status {
                JobStatus::Processing { progress, .. } => {
                    let percent = (progress * 100.0).floor() as u32;
                    if last_percent.map_or(true, |last| percent >= last + 10) {
                        info!("   Progress: {}%", percent);
                        last_percent = Some(percent);
                    }
                }
                other => {
                    info!("Status: {}", other);
                    last_percent = None;
                }
            }

            if updates.changed().await.is_err() {
                break;
            }
        }
    })
}
