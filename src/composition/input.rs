use std::fmt;
use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::JobError;

/// One externally supplied input: display name plus opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping its file name as the display name
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The inputs chosen so far by the caller; either side may still be missing
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    video: Option<InputFile>,
    overlay: Option<InputFile>,
}

impl InputSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, video: InputFile) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_overlay(mut self, overlay: InputFile) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn select_video(&mut self, video: Option<InputFile>) {
        self.video = video;
    }

    pub fn select_overlay(&mut self, overlay: Option<InputFile>) {
        self.overlay = overlay;
    }

    pub fn video(&self) -> Option<&InputFile> {
        self.video.as_ref()
    }

    pub fn overlay(&self) -> Option<&InputFile> {
        self.overlay.as_ref()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Freeze the selection into the immutable input of one run
    pub fn capture(&self) -> Result<JobInput, JobError> {
        let video = self
            .video
            .clone()
            .ok_or(JobError::MissingInput { side: "video" })?;
        let overlay = self
            .overlay
            .clone()
            .ok_or(JobError::MissingInput { side: "overlay" })?;
        Ok(JobInput { video, overlay })
    }
}

/// Video plus overlay for exactly one job attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    video: InputFile,
    overlay: InputFile,
}

impl JobInput {
    pub fn new(video: InputFile, overlay: InputFile) -> Self {
        Self { video, overlay }
    }

    pub fn video(&self) -> &InputFile {
        &self.video
    }

    pub fn overlay(&self) -> &InputFile {
        &self.overlay
    }
}

/// Identifier of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Names of the three working files of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingNames {
    pub input: String,
    pub overlay: String,
    pub output: String,
    namespace: Option<String>,
}

impl WorkingNames {
    pub const INPUT: &'static str = "input.mp4";
    pub const OVERLAY: &'static str = "overlay.gif";
    pub const OUTPUT: &'static str = "output.mp4";

    /// The bare logical names, shared by every run
    pub fn fixed() -> Self {
        Self {
            input: Self::INPUT.to_string(),
            overlay: Self::OVERLAY.to_string(),
            output: Self::OUTPUT.to_string(),
            namespace: None,
        }
    }

    /// The logical names under a per-job directory
    pub fn namespaced(job: &JobId) -> Self {
        let namespace = job.to_string();
        Self {
            input: format!("{}/{}", namespace, Self::INPUT),
            overlay: format!("{}/{}", namespace, Self::OVERLAY),
            output: format!("{}/{}", namespace, Self::OUTPUT),
            namespace: Some(namespace),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl Default for WorkingNames {
    fn default() -> Self {
        Self::fixed()
    }
}
