use tracing::{debug, info};

use crate::composition::input::WorkingNames;
use crate::engine::EngineHandle;
use crate::error::StageError;

/// Copy both inputs into the engine's working storage.
///
/// Both writes finish before this returns; if either fails the job is
/// aborted and nothing is executed. Content is not validated here.
pub async fn stage(
    handle: &EngineHandle,
    names: &WorkingNames,
    video: &[u8],
    overlay: &[u8],
) -> Result<(), StageError> {
    info!("Staging inputs: video {} bytes, overlay {} bytes", video.len(), overlay.len());

    let engine = handle.engine();
    tokio::try_join!(
        engine.write_file(&names.input, video),
        engine.write_file(&names.overlay, overlay)
    )?;

    debug!("Staged {} and {}", names.input, names.overlay);
    Ok(())
}
