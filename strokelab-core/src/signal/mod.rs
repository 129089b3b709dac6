//! Signal evaluation: labels the current state of a bar series.
//!
//! A signal evaluator reads the analyzer's strokes and the oscillator cache
//! and emits exactly one `SignalRecord`. Insufficient data is not an error:
//! it resolves to `SignalValue::Other`.

pub mod dif_near_zero;
pub mod registry;

pub use dif_near_zero::DifNearZero;
pub use registry::{RegistryError, SignalConfig, SignalRegistry};

use crate::analyze::StrokeAnalyzer;
use crate::cache::OscillatorCache;
use crate::domain::Freq;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value label of a signal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalValue {
    #[serde(rename = "buy point")]
    BuyPoint,
    #[serde(rename = "sell point")]
    SellPoint,
    #[serde(rename = "other")]
    Other,
}

impl SignalValue {
    pub fn label(&self) -> &'static str {
        match self {
            SignalValue::BuyPoint => "buy point",
            SignalValue::SellPoint => "sell point",
            SignalValue::Other => "other",
        }
    }

    /// Swap buy and sell; `Other` stays.
    pub fn mirrored(self) -> Self {
        match self {
            SignalValue::BuyPoint => SignalValue::SellPoint,
            SignalValue::SellPoint => SignalValue::BuyPoint,
            SignalValue::Other => SignalValue::Other,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalParseError {
    #[error("unknown signal value: '{0}'")]
    UnknownValue(String),
    #[error("signal string must have 7 '_'-separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid signal score: '{0}'")]
    Score(String),
}

impl FromStr for SignalValue {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy point" => Ok(SignalValue::BuyPoint),
            "sell point" => Ok(SignalValue::SellPoint),
            "other" => Ok(SignalValue::Other),
            other => Err(SignalParseError::UnknownValue(other.to_string())),
        }
    }
}

/// Wildcard used for the unused secondary values.
pub const ANY: &str = "any";

/// The output of one signal evaluation.
///
/// `k1`/`k2`/`k3` scope the signal (frequency, rule + parameters, rule
/// version); `value` is the label. The canonical string form is
/// `k1_k2_k3_value_v2_v3_score`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalRecord {
    pub k1: String,
    pub k2: String,
    pub k3: String,
    pub value: SignalValue,
    pub v2: String,
    pub v3: String,
    pub score: i32,
}

impl SignalRecord {
    pub fn new(
        k1: impl Into<String>,
        k2: impl Into<String>,
        k3: impl Into<String>,
        value: SignalValue,
    ) -> Self {
        Self {
            k1: k1.into(),
            k2: k2.into(),
            k3: k3.into(),
            value,
            v2: ANY.to_string(),
            v3: ANY.to_string(),
            score: 0,
        }
    }

    /// The scope part of the signal, `k1_k2_k3`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.k1, self.k2, self.k3)
    }
}

impl fmt::Display for SignalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_{}",
            self.k1, self.k2, self.k3, self.value, self.v2, self.v3, self.score
        )
    }
}

impl FromStr for SignalRecord {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 7 {
            return Err(SignalParseError::FieldCount(parts.len()));
        }
        let score = parts[6]
            .parse::<i32>()
            .map_err(|_| SignalParseError::Score(parts[6].to_string()))?;
        Ok(Self {
            k1: parts[0].to_string(),
            k2: parts[1].to_string(),
            k3: parts[2].to_string(),
            value: parts[3].parse()?,
            v2: parts[4].to_string(),
            v3: parts[5].to_string(),
            score,
        })
    }
}

/// A typed signal rule.
///
/// Implementations must be deterministic: the same analyzer state, cache
/// contents and parameters always give the same record.
pub trait SignalEvaluator: Send + Sync {
    /// Stable registry identifier (e.g., "dif_near_zero").
    fn name(&self) -> &str;

    /// Frequency the rule is evaluated on.
    fn freq(&self) -> Freq;

    /// Scope keys of every record this evaluator emits.
    fn keys(&self) -> (String, String, String);

    /// Evaluate the rule against the analyzer's current state.
    ///
    /// The cache is filled for the analyzer's raw bars as a side effect.
    fn evaluate(&self, analyzer: &StrokeAnalyzer, cache: &mut OscillatorCache) -> SignalRecord;
}
