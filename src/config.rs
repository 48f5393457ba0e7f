//! # Configuration Module
//!
//! Engine tunables and config-file discovery.
//!
//! Every weight the scorer and reranker use lives in [`EngineConfig`], a plain
//! immutable value. Files only need the fields they change; everything else
//! keeps its default.
//!
//! ## Lookup Order
//!
//! 1. `--config <path>` on the command line
//! 2. `ENCORE_CONFIG` environment variable
//! 3. The platform config directory:
//!    - Linux: `~/.config/encore/config.json`
//!    - macOS: `~/Library/Application Support/encore/config.json`
//!    - Windows: `%APPDATA%\encore\config.json`
//! 4. Built-in defaults

use crate::algorithm::{PairwiseWeights, WeightConfig};
use crate::candidates::DEFAULT_POOL_CAPACITY;
use crate::queue::QueueConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ENCORE_CONFIG";

/// All engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: WeightConfig,
    pub pairwise: PairwiseWeights,
    pub queue: QueueConfig,
    /// Maximum candidate pool size
    pub pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            pairwise: PairwiseWeights::default(),
            queue: QueueConfig::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Bring out-of-range values back into range.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.queue.lambda = match self.queue.lambda.is_finite() {
            true => self.queue.lambda.clamp(0.0, 1.0),
            false => QueueConfig::default().lambda,
        };
        self.queue.shuffle_window = self.queue.shuffle_window.max(1);
        self.pool_capacity = self.pool_capacity.max(1);
        self
    }

    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config.validated())
    }

    /// Resolve the config using the lookup order above.
    ///
    /// An explicitly named file (flag or environment) must exist; the default
    /// location is only used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named or existing default file
    /// cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::from_path(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            let path = PathBuf::from(path);
            info!("Loading config from ${CONFIG_ENV} ({})", path.display());
            return Self::from_path(&path);
        }

        match default_config_path().filter(|path| path.is_file()) {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_path(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Returns the platform-appropriate config file path, if the platform has a
/// config directory at all. The file itself may not exist.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("encore").join("config.json"))
}
