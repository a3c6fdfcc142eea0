//! # Output Materializer
//!
//! Turns the engine's rendered file into an [`OutputArtifact`]: bytes, MIME
//! type, a revocable [`ObjectUrl`] and a safe download name.

pub mod materializer;
pub mod object_url;

pub use materializer::{derive_filename, safe_name, OutputArtifact, OutputMaterializer, OUTPUT_MIME};
pub use object_url::{Blob, ObjectUrl, ObjectUrlRegistry};
