//! Configuration for the record flow engine
//!
//! This module handles engine-wide settings:
//! - Edge buffering (bounded capacity, largest accepted record)
//! - Striped pool sizing for parallel components
//! - Runtime behaviour (abort on error, default fault policy)
//!
//! Per-component settings live in [`settings`].
//!
//! # Files
//!
//! Engine configuration is read from JSON or TOML, chosen by file extension.
//! The default location is `<config dir>/recordflow/engine.toml`:
//! - **Linux**: `~/.config/recordflow/engine.toml`
//! - **macOS**: `~/Library/Application Support/recordflow/engine.toml`
//! - **Windows**: `%APPDATA%\recordflow\engine.toml`
//!
//! # Example
//!
//! ```toml
//! [edge]
//! capacity = 1024
//!
//! [pool]
//! stripes = 8
//! workers = 4
//!
//! [runtime]
//! fault_policy = "controlled"
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{FlowError, Result};
use crate::io::policy::FaultPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for configuration directories
pub const APP_ID: &str = "recordflow";

/// Engine configuration filename
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Default bounded capacity of an edge, in records
pub const DEFAULT_EDGE_CAPACITY: usize = 256;

/// Default largest serialized record an edge accepts (12 MiB)
pub const DEFAULT_RECORD_LIMIT: usize = 12 * 1024 * 1024;

/// Default number of stripes in a striped pool
pub const DEFAULT_STRIPES: usize = 4;

/// Default records per stripe
pub const DEFAULT_STRIPE_CAPACITY: usize = 4096;

/// Default worker threads fed by a striped pool
pub const DEFAULT_WORKERS: usize = 2;

/// Get the default engine configuration path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(ENGINE_CONFIG_FILE))
}

/// Edge buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Records buffered per edge before the writer blocks
    pub capacity: usize,
    /// Largest serialized record, in bytes
    pub record_limit: usize,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EDGE_CAPACITY,
            record_limit: DEFAULT_RECORD_LIMIT,
        }
    }
}

/// Striped pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub stripes: usize,
    pub stripe_capacity: usize,
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            stripes: DEFAULT_STRIPES,
            stripe_capacity: DEFAULT_STRIPE_CAPACITY,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Runtime behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stop the whole graph when one component fails
    pub abort_on_error: bool,
    /// Fault policy for readers that do not set their own
    pub fault_policy: FaultPolicy,
    /// Prefix of component thread names
    pub thread_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            abort_on_error: true,
            fault_policy: FaultPolicy::Strict,
            thread_prefix: "node".to_string(),
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub edge: EdgeConfig,
    pub pool: PoolConfig,
    pub runtime: RuntimeConfig,
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

impl EngineConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                FlowError::Configuration(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                FlowError::Configuration(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML or pretty JSON, chosen by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FlowError::Configuration(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| {
                FlowError::Configuration(format!("Failed to serialize config: {}", e))
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                FlowError::Configuration(format!("Failed to serialize config: {}", e))
            })?
        };

        std::fs::write(path, content).map_err(|e| {
            FlowError::Configuration(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.edge.record_limit == 0 {
            return Err(FlowError::Configuration(
                "edge.record_limit must be positive".to_string(),
            ));
        }
        if self.pool.stripes == 0 || self.pool.stripe_capacity == 0 || self.pool.workers == 0 {
            return Err(FlowError::Configuration(
                "pool.stripes, pool.stripe_capacity and pool.workers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
