//! Sampling frequency of a bar series.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bar sampling frequency.
///
/// The label (`"30m"`, `"D"`, ...) is used verbatim as the first key of every
/// signal record, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Freq {
    Tick,
    F1,
    F5,
    F15,
    F30,
    F60,
    D,
    W,
    M,
    S,
    Y,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown frequency: '{0}'")]
pub struct FreqParseError(pub String);

impl Freq {
    pub const ALL: [Freq; 11] = [
        Freq::Tick,
        Freq::F1,
        Freq::F5,
        Freq::F15,
        Freq::F30,
        Freq::F60,
        Freq::D,
        Freq::W,
        Freq::M,
        Freq::S,
        Freq::Y,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Freq::Tick => "tick",
            Freq::F1 => "1m",
            Freq::F5 => "5m",
            Freq::F15 => "15m",
            Freq::F30 => "30m",
            Freq::F60 => "60m",
            Freq::D => "D",
            Freq::W => "W",
            Freq::M => "M",
            Freq::S => "S",
            Freq::Y => "Y",
        }
    }

    /// Bucket width in minutes for intraday frequencies.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Freq::F1 => Some(1),
            Freq::F5 => Some(5),
            Freq::F15 => Some(15),
            Freq::F30 => Some(30),
            Freq::F60 => Some(60),
            _ => None,
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Freq::Tick) || self.minutes().is_some()
    }
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Freq {
    type Err = FreqParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let freq = match s.trim() {
            "tick" | "Tick" => Freq::Tick,
            "1m" | "1min" => Freq::F1,
            "5m" | "5min" => Freq::F5,
            "15m" | "15min" => Freq::F15,
            "30m" | "30min" => Freq::F30,
            "60m" | "60min" | "1h" => Freq::F60,
            "D" | "1d" | "daily" => Freq::D,
            "W" | "1w" | "weekly" => Freq::W,
            "M" | "monthly" => Freq::M,
            "S" | "quarterly" => Freq::S,
            "Y" | "yearly" => Freq::Y,
            other => return Err(FreqParseError(other.to_string())),
        };
        Ok(freq)
    }
}

impl TryFrom<String> for Freq {
    type Error = FreqParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Freq> for String {
    fn from(freq: Freq) -> Self {
        freq.label().to_string()
    }
}
