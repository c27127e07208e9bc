//! Configuration for the OpenPitwall pipeline.
//!
//! The system has few knobs: where recorded captures live, whether and where
//! raw streams are re-recorded, and when queue depth is worth warning about.
//! Configuration is YAML; a missing file falls back to defaults so the
//! pipeline can run against a bare checkout.

#![deny(static_mut_refs)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitwallConfig {
    /// Directory scanned for capture directories to replay.
    pub capture_root: PathBuf,

    pub recording: RecordingConfig,

    pub queue: QueueConfig,
}

impl Default for PitwallConfig {
    fn default() -> Self {
        Self {
            capture_root: PathBuf::from("./SimulationData"),
            recording: RecordingConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Raw-stream re-recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub enabled: bool,

    /// Root under which each recorded session gets its own capture directory.
    pub output_root: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_root: PathBuf::from("./SimulationData"),
        }
    }
}

/// Ingestion queue diagnostics settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue depth above which the consumer logs that it is lagging the
    /// producer. The queue itself stays unbounded.
    pub depth_warn_threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            depth_warn_threshold: 500,
        }
    }
}

impl PitwallConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read,
    /// and parse/validation errors as in [`Self::from_yaml_str`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No configuration file found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Validate field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("capture_root must not be empty"));
        }
        if self.recording.enabled && self.recording.output_root.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "recording.output_root must not be empty when recording is enabled",
            ));
        }
        if self.queue.depth_warn_threshold == 0 {
            return Err(ConfigError::invalid(
                "queue.depth_warn_threshold must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}
