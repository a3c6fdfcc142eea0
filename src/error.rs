use thiserror::Error;

/// Main error type for the multiply compositor
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Engine initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Input staging error: {0}")]
    Stage(#[from] StageError),

    #[error("Engine execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Output read error: {0}")]
    Read(#[from] ReadError),

    #[error("Job rejected: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine start-up errors. Terminal for the handle being initialized.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Engine resource '{resource}' not found in {location}")]
    ResourceUnavailable { resource: String, location: String },

    #[error("Engine resource '{resource}' failed to boot: {reason}")]
    BootFailed { resource: String, reason: String },

    #[error("Failed to create engine working storage: {0}")]
    WorkingStorage(#[source] std::io::Error),

    #[error("Engine has already been initialized")]
    AlreadyInitialized,
}

/// Working-storage write errors
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid working file name: {name}")]
    InvalidName { name: String },

    #[error("Failed to write working file {name}: {source}")]
    WriteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Engine execution errors
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to start engine: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine ran and reported a failure. `message` is the engine's own text.
    #[error("{message}")]
    Failed { code: Option<i32>, message: String },

    #[error("Engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Output artifact read errors
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Working file not found: {name}")]
    Missing { name: String },

    #[error("Working file is empty: {name}")]
    Empty { name: String },

    #[error("Failed to read working file {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a run is refused before anything is staged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Engine is not ready")]
    EngineNotReady,

    #[error("A job is already processing")]
    AlreadyProcessing,

    #[error("Missing {side} input")]
    MissingInput { side: &'static str },

    #[error("Compositor has been shut down")]
    ShutDown,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Check if a fresh attempt could succeed without restarting the process
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Initialization is terminal for the handle
            Self::Init(_) => false,
            Self::Config(_) => false,
            Self::Job(JobError::ShutDown) => false,
            _ => true,
        }
    }

    /// Get the message surfaced to the user in the `error` status.
    ///
    /// Engine-reported failures are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Exec(ExecError::Failed { message, .. }) => message.clone(),
            Self::Init(InitError::ResourceUnavailable { resource, location }) => {
                format!(
                    "Could not load the media engine: '{}' was not found in {}.",
                    resource, location
                )
            }
            Self::Read(ReadError::Missing { .. }) => {
                "The engine finished but produced no output file.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
