//! # Job Status Machine
//!
//! The single observable state of the compositor. Every transition replaces
//! the whole [`JobStatus`] value inside a [`StatusCell`]; observers receive
//! snapshots through a `tokio::sync::watch` channel and never see a
//! half-applied update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::engine::EngineEvent;
use crate::error::JobError;

/// Observable state of the compositor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobStatus {
    /// The engine is still loading (initial state)
    LoadingEngine,

    /// The engine is ready and no job has run yet
    Ready,

    /// A job is running
    Processing {
        /// Fraction complete, 0.0-1.0
        progress: f64,
        /// Most recent engine log line
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log: Option<String>,
    },

    /// The last job finished and its artifact is available
    Done { url: String, filename: String },

    /// Engine start-up or the last job failed
    Error { message: String },
}

impl JobStatus {
    /// A fresh `processing` state with no progress and no log line
    pub fn processing() -> Self {
        Self::Processing {
            progress: 0.0,
            log: None,
        }
    }

    /// Get string representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadingEngine => "loading-engine",
            Self::Ready => "ready",
            Self::Processing { .. } => "processing",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// `done` and `error` end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    /// Progress of the running job, if any
    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::Processing { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run-eligibility predicate: both inputs selected and the status is
/// neither `processing` nor `loading-engine`.
pub fn can_run(video_selected: bool, overlay_selected: bool, status: &JobStatus) -> bool {
    video_selected
        && overlay_selected
        && !matches!(status, JobStatus::Processing { .. } | JobStatus::LoadingEngine)
}

/// Shared cell holding the current [`JobStatus`].
///
/// Cloning the cell shares the same state. Once [`StatusCell::detach`] has
/// been called every further update is dropped.
#[derive(Debug, Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<JobStatus>>,
    detached: Arc<AtomicBool>,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCell {
    /// Create a cell in the `loading-engine` state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobStatus::LoadingEngine);
        Self {
            tx: Arc::new(tx),
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the current status
    pub fn current(&self) -> JobStatus {
        self.tx.borrow().clone()
    }

    /// Observe every future transition
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.tx.subscribe()
    }

    /// Replace the status wholesale
    pub fn replace(&self, status: JobStatus) {
        if self.is_detached() {
            return;
        }
        debug!("Status -> {}", status.as_str());
        self.tx.send_replace(status);
    }

    /// Atomically move into `processing` if no job is running and the
    /// engine has finished loading.
    pub fn begin_processing(&self) -> Result<(), JobError> {
        if self.is_detached() {
            return Err(JobError::ShutDown);
        }

        let mut rejection = None;
        self.tx.send_if_modified(|status| match status {
            JobStatus::Processing { .. } => {
                rejection = Some(JobError::AlreadyProcessing);
                false
            }
            JobStatus::LoadingEngine => {
                rejection = Some(JobError::EngineNotReady);
                false
            }
            _ => {
                *status = JobStatus::processing();
                true
            }
        });

        match rejection {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Update only the progress of a running job.
    ///
    /// Returns `false` when the event was dropped (no job running, detached,
    /// or a non-finite value).
    pub fn apply_progress(&self, value: f64) -> bool {
        if self.is_detached() || !value.is_finite() {
            return false;
        }
        let value = value.clamp(0.0, 1.0);
        self.tx.send_if_modified(|status| match status {
            JobStatus::Processing { progress, .. } => {
                *progress = value;
                true
            }
            _ => false,
        })
    }

    /// Update only the log line of a running job
    pub fn apply_log(&self, line: impl Into<String>) -> bool {
        if self.is_detached() {
            return false;
        }
        let line = line.into();
        self.tx.send_if_modified(|status| match status {
            JobStatus::Processing { log, .. } => {
                *log = Some(line);
                true
            }
            _ => false,
        })
    }

    /// Apply an engine event to a running job
    pub fn apply_event(&self, event: &EngineEvent) -> bool {
        match event {
            EngineEvent::Progress(value) => self.apply_progress(*value),
            EngineEvent::Log(line) => self.apply_log(line.as_str()),
        }
    }

    /// Stop applying updates; used on teardown
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}
