//! # Multiply-Compositor
//!
//! Blend a looping GIF over a video in multiply mode and get back an H.264
//! MP4 with the original audio.
//!
//! The library drives an external media engine through a small pipeline:
//! stage both inputs, build a fixed filter graph, run it while streaming
//! progress into an observable status, then hand back the rendered file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multiply_compositor::{
//!     composition::{InputFile, InputSelection, MultiplyCompositor},
//!     config::Config,
//!     engine::FfmpegLoader,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let compositor = MultiplyCompositor::new();
//! compositor.initialize(&FfmpegLoader::new(config.engine)).await?;
//!
//! let selection = InputSelection::new()
//!     .with_video(InputFile::from_path("holiday.mov").await?)
//!     .with_overlay(InputFile::from_path("sparkles.gif").await?);
//!
//! let artifact = compositor.run(&selection).await?;
//! artifact.write_to("renders/").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`engine`] - Engine trait, lifecycle and the native ffmpeg engine
//! - [`composition`] - Staging, filter graph, execution and orchestration
//! - [`output`] - Output artifacts, filenames and object URLs
//! - [`status`] - The observable job status machine
//! - [`config`] - Configuration management
//!
//! ## Observing Progress
//!
//! ```rust,no_run
//! use multiply_compositor::{composition::MultiplyCompositor, status::JobStatus};
//!
//! # async fn watch(compositor: &MultiplyCompositor) {
//! let mut updates = compositor.subscribe();
//! while updates.changed().await.is_ok() {
//!     if let JobStatus::Processing { progress, .. } = &*updates.borrow() {
//!         println!("{:.0}%", progress * 100.0);
//!     }
//! }
//! # }
//! ```

pub mod composition;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod status;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{InputFile, InputSelection, MultiplyCompositor},
    config::Config,
    error::{CompositorError, Result},
    output::OutputArtifact,
    status::JobStatus,
};
