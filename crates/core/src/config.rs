// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job store configuration

use crate::id::new_instance_id;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default tolerance before a late trigger counts as misfired
pub const DEFAULT_MISFIRE_THRESHOLD: Duration = Duration::from_secs(60);

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-node job store settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Unique id of this scheduler node; prefixes fire-instance ids
    pub instance_id: String,
    pub instance_name: String,
    /// Name of the shared grid (and of its cluster lock)
    pub grid_name: String,
    #[serde(with = "humantime_serde")]
    pub misfire_threshold: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            instance_id: new_instance_id(),
            instance_name: "cj-scheduler".to_string(),
            grid_name: "cj-grid".to_string(),
            misfire_threshold: DEFAULT_MISFIRE_THRESHOLD,
        }
    }
}

impl StoreConfig {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    pub fn with_grid_name(mut self, name: impl Into<String>) -> Self {
        self.grid_name = name.into();
        self
    }

    pub fn with_misfire_threshold(mut self, threshold: Duration) -> Self {
        self.misfire_threshold = threshold;
        self
    }

    /// Parse from TOML, filling unspecified fields with defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_id.trim().is_empty() {
            return Err(ConfigError::Invalid("instance_id must not be empty".into()));
        }
        if self.grid_name.trim().is_empty() {
            return Err(ConfigError::Invalid("grid_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
