//! # Media Engine
//!
//! The engine executes filter-graph commands against files in its own
//! isolated working storage and reports log lines and progress while it runs.
//!
//! [`Engine`] is the seam the orchestration layer depends on; the native
//! implementation lives in [`ffmpeg`]. Engines are created by an
//! [`EngineLoader`] and owned through an [`EngineHandle`].

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{ExecError, InitError, ReadError, StageError};

pub mod ffmpeg;
pub mod lifecycle;

#[cfg(test)]
pub(crate) mod fake;

pub use ffmpeg::{FfmpegEngine, FfmpegLoader};
pub use lifecycle::{initialize, EngineHandle, EngineLifecycle};

/// Passive notifications published by a running engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One line of engine diagnostics
    Log(String),
    /// Fraction of the current command completed, 0.0-1.0
    Progress(f64),
}

/// Core trait every media engine implements
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Write `data` to working storage under `name`, replacing prior content
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), StageError>;

    /// Read a file from working storage
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ReadError>;

    /// Remove a directory (and everything below it) from working storage
    async fn delete_dir(&self, name: &str) -> std::io::Result<()>;

    /// Run one command to completion.
    ///
    /// Log and progress events are published to subscribers while it runs.
    async fn exec(&self, args: &[String]) -> Result<(), ExecError>;

    /// Start observing log and progress events
    fn subscribe(&self) -> EventSubscription;
}

/// Creates a ready engine: loads its resources and boots it
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Engine>, InitError>;
}

/// Fan-out of engine events.
///
/// Events published while nobody is subscribed are dropped, not queued.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: EngineEvent) {
        // Err only means there is no subscriber right now
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A cancellable subscription to engine events.
///
/// Dropping or cancelling the subscription detaches it from the engine.
#[derive(Debug)]
pub struct EventSubscription {
    rx: Option<broadcast::Receiver<EngineEvent>>,
}

impl EventSubscription {
    pub fn new(rx: broadcast::Receiver<EngineEvent>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Wait for the next event. `None` once cancelled or the engine is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                // Last-write-wins: missed events are simply skipped
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already buffered event without waiting
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn cancel(&mut self) {
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

/// Working names must stay inside working storage: relative, non-empty,
/// and without `..`.
pub fn is_valid_working_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
