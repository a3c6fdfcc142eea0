//! Scripted in-memory engine for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::engine::{
    is_valid_working_name, Engine, EngineEvent, EngineLoader, EventBus, EventSubscription,
};
use crate::error::{ExecError, InitError, ReadError, StageError};

/// What a scripted `exec` call does once its events are published
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// Write `output` to the last argument and succeed
    Succeed { output: Vec<u8> },
    /// Succeed without writing anything
    SucceedWithoutOutput,
    /// Fail with the given engine message
    Fail { message: String },
}

pub(crate) struct ScriptedEngine {
    files: Mutex<HashMap<String, Vec<u8>>>,
    events: EventBus,
    script: Mutex<Vec<EngineEvent>>,
    outcome: Mutex<Outcome>,
    gate: Option<Arc<Notify>>,
    failing_write: Option<String>,
    exec_calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            events: EventBus::new(64),
            script: Mutex::new(Vec::new()),
            outcome: Mutex::new(Outcome::Succeed {
                output: b"rendered".to_vec(),
            }),
            gate: None,
            failing_write: None,
            exec_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_events(self, events: Vec<EngineEvent>) -> Self {
        *self.script.lock().unwrap() = events;
        self
    }

    pub(crate) fn with_outcome(self, outcome: Outcome) -> Self {
        *self.outcome.lock().unwrap() = outcome;
        self
    }

    /// Hold every `exec` until the gate is notified
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make writes to names ending in `suffix` fail
    pub(crate) fn failing_write(mut self, suffix: &str) -> Self {
        self.failing_write = Some(suffix.to_string());
        self
    }

    pub(crate) fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn exec_calls(&self) -> Vec<Vec<String>> {
        self.exec_calls.lock().unwrap().clone()
    }

    pub(crate) fn publish(&self, event: EngineEvent) {
        self.events.publish(event);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), StageError> {
        if !is_valid_working_name(name) {
            return Err(StageError::InvalidName {
                name: name.to_string(),
            });
        }
        if let Some(suffix) = &self.failing_write {
            if name.ends_with(suffix.as_str()) {
                return Err(StageError::WriteFailed {
                    name: name.to_string(),
                    source: std::io::Error::other("quota exceeded"),
                });
            }
        }
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ReadError> {
        self.file(name).ok_or_else(|| ReadError::Missing {
            name: name.to_string(),
        })
    }

    async fn delete_dir(&self, name: &str) -> std::io::Result<()> {
        let prefix = format!("{}/", name.trim_end_matches('/'));
        self.files
            .lock()
            .unwrap()
            .retain(|file, _| !file.starts_with(&prefix));
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        self.exec_calls.lock().unwrap().push(args.to_vec());

        let events = self.script.lock().unwrap().clone();
        for event in events {
            self.events.publish(event);
            tokio::task::yield_now().await;
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            Outcome::Succeed { output } => {
                if let Some(name) = args.last() {
                    self.files.lock().unwrap().insert(name.clone(), output);
                }
                Ok(())
            }
            Outcome::SucceedWithoutOutput => Ok(()),
            Outcome::Fail { message } => Err(ExecError::Failed {
                code: Some(1),
                message,
            }),
        }
    }

    fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }
}

/// Loader that hands out a prepared engine or fails like an unreachable resource
pub(crate) struct ScriptedLoader {
    engine: Option<Arc<ScriptedEngine>>,
    failure: Option<String>,
}

impl ScriptedLoader {
    pub(crate) fn ready(engine: ScriptedEngine) -> Self {
        Self::shared(Arc::new(engine))
    }

    pub(crate) fn shared(engine: Arc<ScriptedEngine>) -> Self {
        Self {
            engine: Some(engine),
            failure: None,
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            engine: None,
            failure: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn load(&self) -> Result<Arc<dyn Engine>, InitError> {
        match (&self.engine, &self.failure) {
            (Some(engine), None) => {
                let engine: Arc<dyn Engine> = engine.clone();
                Ok(engine)
            }
            (_, failure) => Err(InitError::ResourceUnavailable {
                resource: "ffmpeg-core".to_string(),
                location: failure.clone().unwrap_or_default(),
            }),
        }
    }
}
