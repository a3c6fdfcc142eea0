use std::pin::pin;

use tracing::{debug, info, warn};

use crate::engine::EngineHandle;
use crate::error::ExecError;
use crate::status::{JobStatus, StatusCell};

/// Run one engine command, streaming its events into `status`.
///
/// Sets `processing` (progress 0, no log) before starting. Each progress or
/// log event replaces just that field while the status is `processing`.
/// On success the status is left as is; the caller decides what comes next.
///
/// The caller must already own the processing slot through
/// [`StatusCell::begin_processing`]; otherwise this would reset the
/// progress of a job in flight.
pub(crate) async fn run(
    handle: &EngineHandle,
    args: &[String],
    status: &StatusCell,
) -> Result<(), ExecError> {
    let engine = handle.engine();

    // Subscribe first so no early event is lost
    let mut events = engine.subscribe();
    status.replace(JobStatus::processing());

    info!("Executing {} command ({} arguments)", engine.name(), args.len());

    let mut exec = pin!(engine.exec(args));
    let mut events_open = true;
    let mut applied = 0usize;

    let result = loop {
        tokio::select! {
            biased;
            result = &mut exec => break result,
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    if status.apply_event(&event) {
                        applied += 1;
                    }
                }
                None => events_open = false,
            },
        }
    };

    // Events published right before completion are still buffered
    while let Some(event) = events.try_recv() {
        if status.apply_event(&event) {
            applied += 1;
        }
    }
    events.cancel();

    debug!("Applied {} engine events", applied);
    match &result {
        Ok(()) => info!("Engine command finished"),
        Err(e) => warn!("Engine command failed: {}", e),
    }
    result
}
