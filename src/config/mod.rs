//! Configuration module for streamexec
//!
//! Settings are read from a TOML file with one table per concern:
//!
//! ```toml
//! [executive]
//! max_continue_iterations = 10000
//! clamp_update_extent = true
//! default_ghost_levels = 0
//!
//! [logging]
//! filter = "info,streamexec=debug"
//!
//! [series]
//! files = ["data/t0.json", "data/t1.json"]
//! time = 0.5
//! grid_dimensions = [32, 32, 8]
//! ```
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use crate::error::{Result, StreamExecError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Executive limits and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutiveConfig {
    /// Upper bound on consecutive continue-executing passes of one algorithm.
    pub max_continue_iterations: usize,
    /// Clamp an update extent that leaves the whole extent instead of failing.
    pub clamp_update_extent: bool,
    /// Ghost levels used when a request does not name any.
    pub default_ghost_levels: usize,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            max_continue_iterations: 10_000,
            clamp_update_extent: true,
            default_ghost_levels: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,streamexec=debug".to_string(),
        }
    }
}

/// What the command-line driver reads and how it samples it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub files: Vec<PathBuf>,
    /// Requested time value; the first step when unset.
    pub time: Option<f64>,
    pub piece: usize,
    pub number_of_pieces: usize,
    pub grid_dimensions: [usize; 3],
    /// Point array averaged over time; skipped when unset.
    pub accumulate_array: Option<String>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            time: None,
            piece: 0,
            number_of_pieces: 1,
            grid_dimensions: [16, 16, 16],
            accumulate_array: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub executive: ExecutiveConfig,
    pub logging: LoggingConfig,
    pub series: SeriesConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamExecError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            StreamExecError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load configuration if `path` exists. A file that exists but cannot be
    /// read or parsed is still an error.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StreamExecError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamExecError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            StreamExecError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
