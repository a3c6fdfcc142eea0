//! Native engine backed by the `ffmpeg` / `ffprobe` executables.
//!
//! Working storage is a private temporary directory owned by the engine.
//! Commands run with that directory as their working directory, so the
//! logical working names are used verbatim as ffmpeg arguments.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::{
    is_valid_working_name, Engine, EngineEvent, EngineLoader, EventBus, EventSubscription,
};
use crate::error::{ExecError, InitError, ReadError, StageError};

/// Global options put in front of every command
const COMMAND_PREAMBLE: [&str; 8] = [
    "-hide_banner",
    "-nostdin",
    "-y",
    "-nostats",
    "-progress",
    "pipe:1",
    "-loglevel",
    "info",
];

/// Loads the engine described by an [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct FfmpegLoader {
    config: EngineConfig,
}

impl FfmpegLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Locate one resource in `base_dir`, or on `PATH` when no base is set
    fn resolve(&self, binary: &str) -> Result<PathBuf, InitError> {
        match &self.config.base_dir {
            Some(dir) => {
                let candidate = dir.join(binary);
                if candidate.is_file() {
                    Ok(candidate)
                } else {
                    Err(InitError::ResourceUnavailable {
                        resource: binary.to_string(),
                        location: dir.display().to_string(),
                    })
                }
            }
            None => which::which(binary).map_err(|_| InitError::ResourceUnavailable {
                resource: binary.to_string(),
                location: "PATH".to_string(),
            }),
        }
    }

    fn create_working_storage(&self) -> Result<TempDir, InitError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("multiply-");

        match &self.config.working_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(InitError::WorkingStorage)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(InitError::WorkingStorage)
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    async fn load(&self) -> Result<Arc<dyn Engine>, InitError> {
        let core = self.resolve(&self.config.core_binary)?;
        let probe = self.resolve(&self.config.probe_binary)?;
        debug!("Engine resources: core={:?} probe={:?}", core, probe);

        boot(&core).await?;
        boot(&probe).await?;

        let workdir = self.create_working_storage()?;
        info!("Engine working storage: {:?}", workdir.path());

        let engine: Arc<dyn Engine> = Arc::new(FfmpegEngine::new(
            core,
            probe,
            workdir,
            self.config.event_capacity,
        ));
        Ok(engine)
    }
}

/// Run `<resource> -version` and require success
async fn boot(resource: &Path) -> Result<(), InitError> {
    let name = resource.display().to_string();

    let output = Command::new(resource)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| InitError::BootFailed {
            resource: name.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(InitError::BootFailed {
            resource: name,
            reason: format!("exited with {}", output.status),
        });
    }

    let banner = String::from_utf8_lossy(&output.stdout);
    debug!("Booted {}", banner.lines().next().unwrap_or(name.as_str()));
    Ok(())
}

/// Engine running `ffmpeg` as a child process per command
pub struct FfmpegEngine {
    core: PathBuf,
    probe: PathBuf,
    workdir: TempDir,
    events: EventBus,
}

impl FfmpegEngine {
    pub fn new(core: PathBuf, probe: PathBuf, workdir: TempDir, event_capacity: usize) -> Self {
        Self {
            core,
            probe,
            workdir,
            events: EventBus::new(event_capacity),
        }
    }

    /// Root of the private working storage
    pub fn working_dir(&self) -> &Path {
        self.workdir.path()
    }

    fn working_path(&self, name: &str) -> Option<PathBuf> {
        is_valid_working_name(name).then(|| self.workdir.path().join(name))
    }

    /// Container duration of a working file in seconds, if the probe can tell
    async fn probe_duration(&self, name: &str) -> Option<f64> {
        let output = Command::new(&self.probe)
            .current_dir(self.workdir.path())
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                name,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), StageError> {
        let path = self.working_path(name).ok_or_else(|| StageError::InvalidName {
            name: name.to_string(),
        })?;

        let write_failed = |source: std::io::Error| StageError::WriteFailed {
            name: name.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        tokio::fs::write(&path, data).await.map_err(write_failed)?;

        debug!("Wrote {} ({} bytes)", name, data.len());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ReadError> {
        let path = self.working_path(name).ok_or_else(|| ReadError::Missing {
            name: name.to_string(),
        })?;

        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ReadError::Missing {
                    name: name.to_string(),
                }
            } else {
                ReadError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    async fn delete_dir(&self, name: &str) -> std::io::Result<()> {
        let path = self.working_path(name).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid working name: {}", name),
            )
        })?;
        tokio::fs::remove_dir_all(path).await
    }

    async fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        let duration = match primary_input(args) {
            Some(name) => self.probe_duration(name).await,
            None => None,
        };
        if duration.is_none() {
            warn!("Input duration unknown; progress will only report completion");
        }

        debug!("Running {} {}", self.core.display(), args.join(" "));

        let mut child = Command::new(&self.core)
            .current_dir(self.workdir.path())
            .args(COMMAND_PREAMBLE)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future is the only way to stop a running command
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Io(std::io::Error::other("engine stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Io(std::io::Error::other("engine stderr not captured")))?;

        // Drain stderr concurrently so the engine never blocks on a full pipe
        let log_events = self.events.clone();
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            let mut tail = FailureTail::default();
            while let Some(line) = read_lossy_line(&mut reader, &mut buf).await {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                log_events.publish(EngineEvent::Log(line.to_string()));
                tail.push(line);
            }
            tail
        });

        let mut tracker = ProgressTracker::new(duration);
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        while let Some(line) = read_lossy_line(&mut reader, &mut buf).await {
            if let Some(fraction) = tracker.feed(&line) {
                self.events.publish(EngineEvent::Progress(fraction));
            }
        }

        let status = child.wait().await?;
        let tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Failed {
                code: status.code(),
                message: tail
                    .message()
                    .unwrap_or_else(|| format!("engine exited with {}", status)),
            })
        }
    }

    fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }
}

/// Next `\n`-terminated line, decoded lossily. `None` at end of stream or
/// when the pipe fails; invalid UTF-8 never stops the reader.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => Some(String::from_utf8_lossy(buf).into_owned()),
        Err(e) => {
            warn!("Engine output stream failed: {}", e);
            None
        }
    }
}

/// Last few stderr lines of a command, kept to explain a failure
#[derive(Debug, Default)]
struct FailureTail {
    lines: VecDeque<String>,
}

impl FailureTail {
    const CAPACITY: usize = 16;

    fn push(&mut self, line: &str) {
        if self.lines.len() == Self::CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    /// The most recent line naming an error, else the last line.
    ///
    /// ffmpeg usually ends a failed encode with a generic `Conversion failed!`
    /// after the line that states the cause.
    fn message(&self) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.contains("Error") || line.contains("error"))
            .or_else(|| self.lines.back())
            .cloned()
    }
}

/// The first `-i` operand: the primary input whose length bounds the output
fn primary_input(args: &[String]) -> Option<&str> {
    args.windows(2)
        .find(|pair| pair[0] == "-i")
        .map(|pair| pair[1].as_str())
}

fn parse_probe_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Turns `-progress` key/value blocks into completion fractions
#[derive(Debug, Clone)]
struct ProgressTracker {
    duration_us: Option<f64>,
    out_time_us: i64,
}

impl ProgressTracker {
    fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_us: duration_secs.map(|secs| secs * 1_000_000.0),
            out_time_us: 0,
        }
    }

    /// Feed one line; returns a fraction at the end of each progress block
    fn feed(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // ffmpeg reports `out_time_ms` in microseconds as well
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_us = us.max(0);
                }
                None
            }
            "progress" if value == "end" => Some(1.0),
            "progress" => self.fraction(),
            _ => None,
        }
    }

    fn fraction(&self) -> Option<f64> {
        let duration = self.duration_us.filter(|d| *d > 0.0)?;
        Some((self.out_time_us as f64 / duration).clamp(0.0, 1.0))
    }
}
