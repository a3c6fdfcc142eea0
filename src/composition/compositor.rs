use tokio::sync::watch;
use tracing::{debug, info, warn};

use chrono::Utc;

use crate::{
    composition::{
        executor,
        filter_graph::FilterGraphSpec,
        input::{InputSelection, JobId, JobInput, WorkingNames},
        staging,
    },
    engine::{EngineHandle, EngineLifecycle, EngineLoader},
    error::{CompositorError, InitError, JobError, Result},
    output::{Blob, ObjectUrl, ObjectUrlRegistry, OutputArtifact, OutputMaterializer},
    status::{self, JobStatus, StatusCell},
};

/// Orchestrates the multiply composite from engine start-up to artifact.
///
/// The pipeline of one run:
/// 1. Capture - freeze the selected inputs into a job
/// 2. Stage - write both inputs into a per-job working namespace
/// 3. Build - render the fixed filter-graph argument list
/// 4. Execute - run the engine, streaming progress into the status
/// 5. Materialize - read the output back and register an object URL
///
/// Every failure after capture ends in `error{message}`; a rejected run
/// leaves the status untouched.
pub struct MultiplyCompositor {
    lifecycle: EngineLifecycle,
    status: StatusCell,
    materializer: OutputMaterializer,
    filter_graph: FilterGraphSpec,
}

impl Default for MultiplyCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplyCompositor {
    /// Create a compositor in the `loading-engine` state
    pub fn new() -> Self {
        Self::with_registry(ObjectUrlRegistry::new())
    }

    /// Create a compositor that registers artifacts in an existing registry
    pub fn with_registry(registry: ObjectUrlRegistry) -> Self {
        Self {
            lifecycle: EngineLifecycle::new(),
            status: StatusCell::new(),
            materializer: OutputMaterializer::new(registry),
            filter_graph: FilterGraphSpec::MULTIPLY,
        }
    }

    /// Load and boot the engine. Only the first call does anything.
    pub async fn initialize(&self, loader: &dyn EngineLoader) -> Result<()> {
        match self.lifecycle.initialize(loader).await {
            Ok(handle) => {
                debug!("Engine ready at {}", handle.ready_at());
                self.status.replace(JobStatus::Ready);
                Ok(())
            }
            Err(InitError::AlreadyInitialized) => {
                warn!("Ignoring repeated engine initialization");
                Err(InitError::AlreadyInitialized.into())
            }
            Err(e) => {
                let err = CompositorError::from(e);
                self.status.replace(JobStatus::Error {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Snapshot of the current status
    pub fn status(&self) -> JobStatus {
        self.status.current()
    }

    /// Observe every status transition
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Whether `run` would currently be accepted for `selection`
    pub fn can_run(&self, selection: &InputSelection) -> bool {
        self.is_ready()
            && !self.status.is_detached()
            && status::can_run(
                selection.has_video(),
                selection.has_overlay(),
                &self.status.current(),
            )
    }

    /// Run one job over the current selection.
    ///
    /// Returns `CompositorError::Job` without touching the status when the
    /// run is rejected (missing input, engine not ready, job in flight).
    pub async fn run(&self, selection: &InputSelection) -> Result<OutputArtifact> {
        let input = selection.capture()?;
        let handle = self
            .lifecycle
            .handle()
            .ok_or(JobError::EngineNotReady)?
            .clone();
        self.status.begin_processing()?;

        let job = JobId::new();
        let started = Utc::now();
        info!("🎬 Starting multiply job {}", job);
        info!("   Video: {} ({} bytes)", input.video().name(), input.video().len());
        info!("   Overlay: {} ({} bytes)", input.overlay().name(), input.overlay().len());

        match self.execute(&handle, &job, &input).await {
            Ok(artifact) => {
                self.status.replace(JobStatus::Done {
                    url: artifact.url().to_string(),
                    filename: artifact.filename().to_string(),
                });
                info!(
                    "🎉 Job {} complete in {:.1}s: {}",
                    job,
                    (Utc::now() - started).num_milliseconds() as f64 / 1000.0,
                    artifact.filename()
                );
                Ok(artifact)
            }
            Err(e) => {
                warn!("Job {} failed: {}", job, e);
                self.status.replace(JobStatus::Error {
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        handle: &EngineHandle,
        job: &JobId,
        input: &JobInput,
    ) -> Result<OutputArtifact> {
        let names = WorkingNames::namespaced(job);

        info!("📥 Step 1: Staging inputs...");
        staging::stage(handle, &names, input.video().bytes(), input.overlay().bytes()).await?;

        info!("🧩 Step 2: Building filter graph...");
        let args = self.filter_graph.build(&names);
        debug!("Engine arguments: {:?}", args);

        info!("⚙️  Step 3: Executing...");
        executor::run(handle, &args, &self.status).await?;

        info!("📦 Step 4: Materializing output...");
        let artifact = self
            .materializer
            .materialize(handle, &names.output, input.video().name())
            .await?;

        if let Some(namespace) = names.namespace() {
            if let Err(e) = handle.engine().delete_dir(namespace).await {
                warn!("Failed to clean up working namespace {}: {}", namespace, e);
            }
        }

        Ok(artifact)
    }

    /// Look up a produced artifact by its reference
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.materializer.registry().resolve(url)
    }

    /// Release a produced artifact
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.materializer.registry().revoke(url)
    }

    /// Detach all observers. Later engine events and status updates are
    /// dropped and new runs are rejected.
    pub fn shutdown(&self) {
        info!("Shutting down compositor");
        self.status.detach();
    }
}
