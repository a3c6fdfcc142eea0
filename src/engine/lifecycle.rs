use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::engine::{Engine, EngineLoader};
use crate::error::InitError;

/// Owned handle to a booted engine.
///
/// Handles only come out of [`initialize`], so holding one means the engine
/// is ready. Clones share the same engine.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn Engine>,
    ready_at: DateTime<Utc>,
}

impl EngineHandle {
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn ready_at(&self) -> DateTime<Utc> {
        self.ready_at
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.name())
            .field("ready_at", &self.ready_at)
            .finish()
    }
}

/// Load and boot an engine. Failure is terminal for this attempt.
pub async fn initialize(loader: &dyn EngineLoader) -> Result<EngineHandle, InitError> {
    let started = Utc::now();
    info!("Loading media engine...");

    let engine = loader.load().await.map_err(|e| {
        warn!("Media engine failed to load: {}", e);
        e
    })?;

    let ready_at = Utc::now();
    info!(
        "Media engine '{}' ready in {} ms",
        engine.name(),
        (ready_at - started).num_milliseconds()
    );

    Ok(EngineHandle { engine, ready_at })
}

/// Holds the single engine handle of an orchestrator.
///
/// Initialization may be attempted exactly once; the handle is never
/// replaced afterwards.
#[derive(Debug, Default)]
pub struct EngineLifecycle {
    attempted: AtomicBool,
    handle: OnceLock<EngineHandle>,
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the one-time initialization
    pub async fn initialize(&self, loader: &dyn EngineLoader) -> Result<EngineHandle, InitError> {
        if self.attempted.swap(true, Ordering::SeqCst) {
            return Err(InitError::AlreadyInitialized);
        }

        let handle = initialize(loader).await?;
        self.handle
            .set(handle.clone())
            .map_err(|_| InitError::AlreadyInitialized)?;
        Ok(handle)
    }

    /// Explicit readiness flag
    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn handle(&self) -> Option<&EngineHandle> {
        self.handle.get()
    }
}
