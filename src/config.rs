//! Engine configuration file support.
//!
//! Reads engine settings from a TOML file. Every knob has a default, so the
//! engine also runs with no file at all. The TTL is defined once here and
//! reused for both in-memory and persisted eviction.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::error::StoreError;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// Reconciliation policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Liveness window for runs and persisted deltas, in minutes.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Age beyond which a persisted dataset snapshot is not considered
    /// fresh for skip-refetch purposes, in hours.
    #[serde(default = "default_cache_fresh_hours")]
    pub cache_fresh_hours: i64,
}

/// Store backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(rename = "type", default = "default_store_type")]
    pub store_type: String,
}

fn default_ttl_minutes() -> i64 {
    10
}

fn default_cache_fresh_hours() -> i64 {
    1
}

fn default_store_type() -> String {
    "memory".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            cache_fresh_hours: default_cache_fresh_hours(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Liveness window as a duration. The sweep period equals the TTL.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.engine.ttl_minutes)
    }

    /// Maximum age of a fresh persisted snapshot.
    pub fn cache_freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.engine.cache_fresh_hours)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` if successful
    /// * `Err(StoreError)` if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            StoreError::configuration(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Load configuration from the default locations, falling back to
    /// defaults when no file exists.
    ///
    /// Searches for `railtrace.toml` in the current directory, `config/`,
    /// and the parent directory.
    pub fn from_default_location() -> Self {
        let search_paths = [
            PathBuf::from("railtrace.toml"),
            PathBuf::from("config/railtrace.toml"),
            PathBuf::from("../railtrace.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                if let Ok(config) = Self::from_file(&path) {
                    return config;
                }
            }
        }

        Self::default()
    }
}
