//! Signal registry: maps a stable identifier to a factory producing a
//! boxed `SignalEvaluator` from a `SignalConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::dif_near_zero::{self, DifNearZero};
use super::SignalEvaluator;
use crate::domain::Freq;
use crate::indicators::{MacdError, MacdParams};

// ─── Config ──────────────────────────────────────────────────────────

/// One configured signal: which rule, on which frequency, with which numeric
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub name: String,
    pub freq: Freq,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl SignalConfig {
    pub fn new(name: impl Into<String>, freq: Freq) -> Self {
        Self {
            name: name.into(),
            freq,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown signal: {0}")]
    UnknownSignal(String),
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParam {
        name: String,
        value: f64,
        reason: String,
    },
    #[error(transparent)]
    Macd(#[from] MacdError),
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Extract a named f64 parameter, falling back to `default`.
fn param(config: &SignalConfig, name: &str, default: f64) -> f64 {
    config.params.get(name).copied().unwrap_or(default)
}

/// Extract a named non-negative integer parameter, truncating fractions.
fn param_u32(config: &SignalConfig, name: &str, default: u32) -> Result<u32, RegistryError> {
    let value = param(config, name, default as f64);
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(RegistryError::InvalidParam {
            name: name.to_string(),
            value,
            reason: "must be a non-negative integer".into(),
        });
    }
    Ok(value as u32)
}

fn param_usize(config: &SignalConfig, name: &str, default: usize) -> Result<usize, RegistryError> {
    let value = param(config, name, default as f64);
    if !value.is_finite() || value < 1.0 {
        return Err(RegistryError::InvalidParam {
            name: name.to_string(),
            value,
            reason: "must be a positive integer".into(),
        });
    }
    Ok(value as usize)
}

// ─── Registry ────────────────────────────────────────────────────────

pub type SignalFactory = fn(&SignalConfig) -> Result<Box<dyn SignalEvaluator>, RegistryError>;

fn build_dif_near_zero(config: &SignalConfig) -> Result<Box<dyn SignalEvaluator>, RegistryError> {
    let t = param_u32(config, "t", dif_near_zero::DEFAULT_T)?;
    let defaults = MacdParams::default();
    let macd = MacdParams::new(
        param_usize(config, "fast", defaults.fast)?,
        param_usize(config, "slow", defaults.slow)?,
        param_usize(config, "signal", defaults.signal)?,
    )?;
    Ok(Box::new(DifNearZero::new(config.freq, t).with_macd(macd)))
}

/// Name → factory table.
#[derive(Clone)]
pub struct SignalRegistry {
    factories: BTreeMap<String, SignalFactory>,
}

impl SignalRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with every built-in rule.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(dif_near_zero::NAME, build_dif_near_zero);
        registry
    }

    /// Register a factory, replacing any previous one under the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: SignalFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, config: &SignalConfig) -> Result<Box<dyn SignalEvaluator>, RegistryError> {
        let factory = self
            .factories
            .get(&config.name)
            .ok_or_else(|| RegistryError::UnknownSignal(config.name.clone()))?;
        factory(config)
    }

    /// Build every configured signal, failing on the first bad one.
    pub fn create_all(
        &self,
        configs: &[SignalConfig],
    ) -> Result<Vec<Box<dyn SignalEvaluator>>, RegistryError> {
        configs.iter().map(|c| self.create(c)).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl std::fmt::Debug for SignalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults() {
        let registry = SignalRegistry::default();
        let eval = registry
            .create(&SignalConfig::new("dif_near_zero", Freq::F30))
            .unwrap();
        assert_eq!(eval.name(), "dif_near_zero");
        assert_eq!(eval.freq(), Freq::F30);
        let (k1, k2, k3) = eval.keys();
        assert_eq!(k1, "30m");
        assert_eq!(k2, "DIFNearZeroT50");
        assert_eq!(k3, "BSAuxV240612");
    }

    #[test]
    fn t_param_is_applied_and_truncated() {
        let registry = SignalRegistry::with_builtins();
        let cfg = SignalConfig::new("dif_near_zero", Freq::D).with_param("t", 30.7);
        let (_, k2, _) = registry.create(&cfg).unwrap().keys();
        assert_eq!(k2, "DIFNearZeroT30");
    }

    #[test]
    fn macd_params_reach_the_key() {
        let registry = SignalRegistry::with_builtins();
        let cfg = SignalConfig::new("dif_near_zero", Freq::F60)
            .with_param("fast", 5.0)
            .with_param("slow", 34.0)
            .with_param("signal", 5.0);
        let (_, k2, _) = registry.create(&cfg).unwrap().keys();
        assert_eq!(k2, "DIFNearZeroT50M5#34#5");
    }

    #[test]
    fn unknown_signal() {
        let registry = SignalRegistry::with_builtins();
        let err = registry
            .create(&SignalConfig::new("nope", Freq::D))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::UnknownSignal("nope".into()));
    }

    #[test]
    fn negative_t_rejected() {
        let registry = SignalRegistry::with_builtins();
        let cfg = SignalConfig::new("dif_near_zero", Freq::D).with_param("t", -1.0);
        assert!(matches!(
            registry.create(&cfg),
            Err(RegistryError::InvalidParam { .. })
        ));
    }

    #[test]
    fn bad_macd_periods_rejected() {
        let registry = SignalRegistry::with_builtins();
        let cfg = SignalConfig::new("dif_near_zero", Freq::D)
            .with_param("fast", 30.0)
            .with_param("slow", 20.0);
        assert!(matches!(registry.create(&cfg), Err(RegistryError::Macd(_))));
    }

    #[test]
    fn config_deserializes_without_params() {
        let cfg: SignalConfig =
            serde_json::from_str(r#"{"name":"dif_near_zero","freq":"60m"}"#).unwrap();
        assert_eq!(cfg.freq, Freq::F60);
        assert!(cfg.params.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = SignalRegistry::with_builtins();
        registry.register("aaa", build_dif_near_zero);
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["aaa", "dif_near_zero"]);
        assert!(registry.contains("aaa"));
    }
}
