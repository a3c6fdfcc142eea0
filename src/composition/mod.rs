//! # Composition
//!
//! The multiply job pipeline: input capture and staging, the fixed filter
//! graph, execution against the engine and the orchestrator tying them
//! together.

pub mod compositor;
pub(crate) mod executor;
pub mod filter_graph;
pub mod input;
pub mod staging;

// Re-exports for convenience
pub use compositor::MultiplyCompositor;
pub use filter_graph::FilterGraphSpec;
pub use input::{InputFile, InputSelection, JobId, JobInput, WorkingNames};
