//! Serializable run configuration.
//!
//! A run is fully described by a TOML file: where the bars live, how strokes
//! are segmented, which signals to evaluate and over which window to replay.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use strokelab_core::analyze::SegmenterConfig;
use strokelab_core::domain::Freq;
use strokelab_core::signal::{SignalConfig, SignalEvaluator, SignalRegistry};

use crate::replay::{ReplayOptions, DEFAULT_HORIZON};
use crate::store::{Adjustment, BarStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Location and adjustment of the bar store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub group: String,
    pub adjustment: Adjustment,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            group: "watchlist".into(),
            adjustment: Adjustment::default(),
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> BarStore {
        BarStore::new(&self.root).with_adjustment(self.adjustment)
    }
}

/// Replay window. Dates are quoted `YYYY-MM-DD` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub symbol: Option<String>,
    pub base_freq: Freq,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub horizon: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            symbol: None,
            base_freq: Freq::F5,
            start: None,
            end: None,
            horizon: DEFAULT_HORIZON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    pub signals: Vec<SignalConfig>,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string against the built-in signals.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate(&SignalRegistry::with_builtins())?;
        Ok(config)
    }

    pub fn validate(&self, registry: &SignalRegistry) -> Result<(), ConfigError> {
        if self.signals.is_empty() {
            return Err(ConfigError::Invalid("at least one [[signals]] entry is required".into()));
        }
        self.segmenter
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.replay.base_freq == Freq::Tick {
            return Err(ConfigError::Invalid("tick bars cannot be replayed".into()));
        }
        if let (Some(start), Some(end)) = (self.replay.start, self.replay.end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "start {start} is after end {end}"
                )));
            }
        }
        let mut keys = BTreeSet::new();
        for signal in &self.signals {
            if signal.freq < self.replay.base_freq {
                return Err(ConfigError::Invalid(format!(
                    "signal '{}' at {} is finer than base frequency {}",
                    signal.name, signal.freq, self.replay.base_freq
                )));
            }
            let evaluator = registry
                .create(signal)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            let (k1, k2, k3) = evaluator.keys();
            let key = format!("{k1}_{k2}_{k3}");
            if !keys.insert(key.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "signal key '{key}' is configured more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            segmenter: self.segmenter,
            horizon: self.replay.horizon,
        }
    }

    /// Deterministic hash of the whole config (blake3 over its JSON form).
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
