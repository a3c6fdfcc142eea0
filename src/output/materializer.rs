use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::engine::EngineHandle;
use crate::error::ReadError;
use crate::output::object_url::{Blob, ObjectUrl, ObjectUrlRegistry};

/// MIME type of the fixed output container
pub const OUTPUT_MIME: &str = "video/mp4";

const FILENAME_PREFIX: &str = "multiply_";
const FILENAME_EXTENSION: &str = ".mp4";
const MAX_BASE_LEN: usize = 40;
const FALLBACK_BASE: &str = "video";

/// Finished render handed to the caller
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    blob: Blob,
    url: ObjectUrl,
    filename: String,
    created_at: DateTime<Utc>,
}

impl OutputArtifact {
    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn mime(&self) -> &str {
        self.blob.mime()
    }

    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    /// Suggested download name, e.g. `multiply_holiday.mp4`
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    /// Write the artifact into `dir` under its suggested filename
    pub async fn write_to<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, self.bytes()).await?;
        Ok(path)
    }
}

/// Reads the rendered file back out of working storage
#[derive(Debug, Clone, Default)]
pub struct OutputMaterializer {
    registry: ObjectUrlRegistry,
}

impl OutputMaterializer {
    pub fn new(registry: ObjectUrlRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Read `output_name`, register it under a new object URL and derive
    /// the download name from the original video name.
    pub async fn materialize(
        &self,
        handle: &EngineHandle,
        output_name: &str,
        suggested_base_name: &str,
    ) -> Result<OutputArtifact, ReadError> {
        let bytes = handle.engine().read_file(output_name).await?;
        if bytes.is_empty() {
            return Err(ReadError::Empty {
                name: output_name.to_string(),
            });
        }

        let blob = Blob::new(Arc::<[u8]>::from(bytes), OUTPUT_MIME);
        let size = blob.len();
        let url = self.registry.create(blob.clone());
        let filename = derive_filename(suggested_base_name);

        debug!("Registered {} for {}", url, output_name);
        info!("Output ready: {} ({:.1} MB)", filename, size as f64 / 1024.0 / 1024.0);

        Ok(OutputArtifact {
            blob,
            url,
            filename,
            created_at: Utc::now(),
        })
    }
}

/// Download name for an output derived from the original video name
pub fn derive_filename(original_name: &str) -> String {
    format!("{}{}{}", FILENAME_PREFIX, safe_name(original_name), FILENAME_EXTENSION)
}

/// Filename body: extension stripped, every run of characters outside
/// `[A-Za-z0-9_-]` collapsed to one `_`, at most 40 characters.
pub fn safe_name(original_name: &str) -> String {
    let mut body = String::with_capacity(original_name.len());
    let mut in_run = false;

    for c in strip_extension(original_name).chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            body.push(c);
            in_run = false;
        } else if !in_run {
            body.push('_');
            in_run = true;
        }
    }

    // Only ASCII remains, so byte truncation is char truncation
    body.truncate(MAX_BASE_LEN);

    if body.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        body
    }
}

/// Drop a trailing `.ext`, where `ext` has no `.` or `/`
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::{ScriptedEngine, ScriptedLoader};
    use crate::engine::initialize;

    fn has_output_shape(filename: &str) -> bool {
        let Some(body) = filename
            .strip_prefix("multiply_")
            .and_then(|rest| rest.strip_suffix(".mp4"))
        else {
            return false;
        };
        (1..=40).contains(&body.len())
            && body
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    #[test]
    fn test_derive_filename_examples() {
        assert_eq!(derive_filename("holiday.mp4"), "multiply_holiday.mp4");
        assert_eq!(derive_filename("My Trip (2024).mov"), "multiply_My_Trip_2024_.mp4");
        assert_eq!(derive_filename("clip.final.v2.webm"), "multiply_clip_final_v2.mp4");
        assert_eq!(derive_filename("été à Paris.mkv"), "multiply__t_Paris.mp4");
        assert_eq!(derive_filename("snake_case-name"), "multiply_snake_case-name.mp4");
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(strip_extension("video.mp4"), "video");
        assert_eq!(strip_extension("archive."), "archive.");
        assert_eq!(strip_extension("dir.v2/clip"), "dir.v2/clip");
        assert_eq!(strip_extension(".mov"), "");
        assert_eq!(strip_extension("noext"), "noext");
    }

    #[test]
    fn test_body_is_truncated_to_40() {
        let name = format!("{}.mp4", "a".repeat(100));
        let derived = derive_filename(&name);

        assert_eq!(derived, format!("multiply_{}.mp4", "a".repeat(40)));
        assert!(has_output_shape(&derived));
    }

    #[test]
    fn test_empty_body_falls_back() {
        assert_eq!(derive_filename(".mov"), "multiply_video.mp4");
        assert_eq!(derive_filename(""), "multiply_video.mp4");
    }

    #[test]
    fn test_derivation_is_deterministic_and_well_formed() {
        let names = [
            "My Trip (2024).mov",
            "   ",
            "ünïcödé.gif",
            "a/b\\c:d*e?.avi",
            "---.mp4",
            "x",
        ];
        for name in names {
            let derived = derive_filename(name);
            assert_eq!(derived, derive_filename(name));
            assert!(has_output_shape(&derived), "bad shape for {:?}: {}", name, derived);
        }
    }

    #[tokio::test]
    async fn test_materialize_registers_artifact() {
        let engine = std::sync::Arc::new(ScriptedEngine::new());
        let handle = initialize(&ScriptedLoader::shared(engine.clone())).await.unwrap();
        handle.engine().write_file("output.mp4", b"rendered").await.unwrap();

        let materializer = OutputMaterializer::default();
        let artifact = materializer
            .materialize(&handle, "output.mp4", "holiday.mov")
            .await
            .unwrap();

        assert_eq!(artifact.bytes(), b"rendered");
        assert_eq!(artifact.mime(), "video/mp4");
        assert_eq!(artifact.filename(), "multiply_holiday.mp4");

        let blob = materializer.registry().resolve(artifact.url()).unwrap();
        assert_eq!(blob.bytes(), b"rendered");
    }

    #[tokio::test]
    async fn test_materialize_missing_output() {
        let handle = initialize(&ScriptedLoader::ready(ScriptedEngine::new()))
            .await
            .unwrap();

        let result = OutputMaterializer::default()
            .materialize(&handle, "output.mp4", "holiday.mov")
            .await;

        assert!(matches!(result, Err(ReadError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_materialize_rejects_zero_byte_output() {
        let handle = initialize(&ScriptedLoader::ready(ScriptedEngine::new()))
            .await
            .unwrap();
        handle.engine().write_file("output.mp4", b"").await.unwrap();
        let materializer = OutputMaterializer::default();

        let result = materializer
            .materialize(&handle, "output.mp4", "holiday.mov")
            .await;

        assert!(matches!(result, Err(ReadError::Empty { ref name }) if name == "output.mp4"));
        assert!(materializer.registry().is_empty());
    }

    #[tokio::test]
    async fn test_write_to_uses_derived_name() {
        let handle = initialize(&ScriptedLoader::ready(ScriptedEngine::new()))
            .await
            .unwrap();
        handle.engine().write_file("output.mp4", b"rendered").await.unwrap();
        let artifact = OutputMaterializer::default()
            .materialize(&handle, "output.mp4", "beach day.mp4")
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = artifact.write_to(dir.path().join("renders")).await.unwrap();

        assert_eq!(path.file_name().unwrap(), "multiply_beach_day.mp4");
        assert_eq!(std::fs::read(path).unwrap(), b"rendered");
    }
}
