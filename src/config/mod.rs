//! Configuration management for the pulse adapter
//!
//! Handles loading, parsing and validation of the pulse device documents.
//! Unknown fields are kept so that persisting a document never drops data
//! written by other tools.

pub mod store;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

pub use store::{open_store, ConfigStore, SledConfigStore, YamlFileStore};

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub pulses: Vec<PulseConfig>,
    /// Fields this adapter does not interpret, passed through on save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-device configuration record
///
/// `invert` and `duration` are optional at the document level so that one
/// incomplete entry does not prevent the rest from loading. They are checked
/// by [`PulseConfig::settings`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    /// Reversion delay in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub extend_on_retrigger: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Validated, immutable settings a controller is built from
#[derive(Debug, Clone, PartialEq)]
pub struct PulseSettings {
    pub id: String,
    pub name: String,
    pub invert: bool,
    pub duration: Duration,
    pub extend_on_retrigger: bool,
}

/// Longest accepted reversion delay (one year)
pub const MAX_DURATION_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Per-device configuration problems detected at startup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("pulse '{name}' has no duration")]
    MissingDuration { name: String },

    #[error("pulse '{name}' has invalid duration {value} (must be a positive number of seconds, at most one year)")]
    InvalidDuration { name: String, value: f64 },

    #[error("pulse '{name}' has no invert flag")]
    MissingInvert { name: String },

    #[error("pulse '{name}' has no identifier")]
    MissingId { name: String },
}

impl PulseConfig {
    /// Create a config with the fields every device needs
    pub fn new(name: impl Into<String>, invert: bool, duration_secs: f64) -> Self {
        Self {
            name: name.into(),
            invert: Some(invert),
            duration: Some(duration_secs),
            ..Self::default()
        }
    }

    /// The persisted id, ignoring empty strings
    pub fn assigned_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Validate this record into controller settings
    pub fn settings(&self) -> Result<PulseSettings, ConfigError> {
        let name = self.name.clone();

        let id = self
            .assigned_id()
            .ok_or_else(|| ConfigError::MissingId { name: name.clone() })?
            .to_string();

        let invert = self
            .invert
            .ok_or_else(|| ConfigError::MissingInvert { name: name.clone() })?;

        let secs = self
            .duration
            .ok_or_else(|| ConfigError::MissingDuration { name: name.clone() })?;

        if !secs.is_finite() || secs <= 0.0 || secs > MAX_DURATION_SECS {
            return Err(ConfigError::InvalidDuration { name, value: secs });
        }
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::InvalidDuration { name: name.clone(), value: secs })?;

        Ok(PulseSettings {
            id,
            name,
            invert,
            duration,
            extend_on_retrigger: self.extend_on_retrigger,
        })
    }
}

impl AdapterConfig {
    /// Parse a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("Failed to parse YAML pulse config")
    }

    /// Render as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize pulse config to YAML")
    }

    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Save configuration to a YAML file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
