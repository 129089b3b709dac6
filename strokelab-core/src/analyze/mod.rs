//! Stroke segmentation.
//!
//! Raw bars → inclusion-free merged bars → fractals → strokes. The analyzer
//! consumes bars one at a time and keeps three things the signal rules read:
//! the confirmed strokes, the unconfirmed merged-bar buffer after the last
//! stroke, and the raw-bar window starting at the first kept stroke.

pub mod analyzer;
pub mod fractal;
pub mod merge;
pub mod stroke;

pub use analyzer::StrokeAnalyzer;
pub use fractal::{check_fx, check_fxs, Fractal, Mark, Power};
pub use merge::{remove_include, MergedBar};
pub use stroke::{check_bi, Stroke};

use crate::domain::Direction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalyzeError {
    #[error("bar at {next} is older than the previous bar at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },

    #[error("bar for symbol '{got}' fed to analyzer for '{expected}'")]
    SymbolMismatch { expected: String, got: String },

    #[error("{direction} stroke cannot run from a {start:?} to a {end:?} fractal")]
    FractalMismatch {
        direction: Direction,
        start: Mark,
        end: Mark,
    },

    #[error("stroke needs at least 3 merged bars, got {0}")]
    StrokeTooShort(usize),

    #[error("invalid segmenter config: {0}")]
    InvalidConfig(String),
}

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Minimum merged bars between the first bar of the start fractal and the
    /// last bar of the end fractal.
    pub min_bi_len: usize,
    /// Maximum number of confirmed strokes kept; older ones are dropped along
    /// with their raw bars.
    pub max_bi_num: usize,
    /// Accept a stroke shorter than `min_bi_len` when its move exceeds this
    /// multiple of the recent average move. Disabled unless > 0.5.
    pub bi_change_th: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_bi_len: 6,
            max_bi_num: 50,
            bi_change_th: -1.0,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        if self.min_bi_len < 3 {
            return Err(AnalyzeError::InvalidConfig(format!(
                "min_bi_len must be >= 3, got {}",
                self.min_bi_len
            )));
        }
        if self.max_bi_num == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "max_bi_num must be >= 1".into(),
            ));
        }
        if self.bi_change_th.is_nan() {
            return Err(AnalyzeError::InvalidConfig("bi_change_th is NaN".into()));
        }
        Ok(())
    }

    pub fn change_threshold_enabled(&self) -> bool {
        self.bi_change_th > 0.5
    }
}
