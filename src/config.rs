use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the multiply compositor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine resource locations and working storage
    pub engine: EngineConfig,

    /// Where the CLI writes finished artifacts
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        Self::from_toml_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() }.into())
    }

    /// Parse configuration from TOML text; missing tables fall back to defaults
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            }
            .into()
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

/// Engine configuration.
///
/// The engine is made of two resources: the runnable core (`ffmpeg`) and its
/// support payload (`ffprobe`). Both are resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding both resources. When unset they are looked up on `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// File name of the runnable core
    pub core_binary: String,

    /// File name of the support payload
    pub probe_binary: String,

    /// Parent directory for the engine's private working storage.
    /// Defaults to the system temporary directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_root: Option<PathBuf>,

    /// Capacity of the log/progress event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            core_binary: "ffmpeg".to_string(),
            probe_binary: "ffprobe".to_string(),
            working_root: None,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.core_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "engine.core_binary".to_string(),
                value: self.core_binary.clone()
            }.into());
        }

        if self.probe_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "engine.probe_binary".to_string(),
                value: self.probe_binary.clone()
            }.into());
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.event_capacity".to_string(),
                value: self.event_capacity.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the derived output file is written to
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.directory".to_string(),
                value: String::new()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("multiply.toml");

        let mut original_config = Config::default();
        original_config.engine.base_dir = Some(PathBuf::from("/opt/ffmpeg/bin"));

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml_str("[engine]\ncore_binary = \"ffmpeg7\"\n").unwrap();

        assert_eq!(config.engine.core_binary, "ffmpeg7");
        assert_eq!(config.engine.probe_binary, "ffprobe");
        assert_eq!(config.output.directory, PathBuf::from("."));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let result = Config::from_file(dir.path().join("absent.toml"));
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_engine_config() {
        let mut config = Config::default();
        config.engine.core_binary = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.event_capacity = 0;
        assert!(config.validate().is_err());
    }
}
