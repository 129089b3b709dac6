//! MACD: dual-EMA momentum oscillator.
//!
//! fast = EMA(close, fast_period), slow = EMA(close, slow_period)
//! dif  = fast - slow
//! dea  = EMA(dif, signal_period)
//! macd = (dif - dea) * 2

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ema::ema_step;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacdError {
    #[error("MACD periods must be >= 1 (fast={fast}, slow={slow}, signal={signal})")]
    ZeroPeriod {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    #[error("MACD slow period ({slow}) must be > fast period ({fast})")]
    SlowNotAboveFast { fast: usize, slow: usize },
}

/// MACD parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdParams {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, MacdError> {
        if fast == 0 || slow == 0 || signal == 0 {
            return Err(MacdError::ZeroPeriod { fast, slow, signal });
        }
        if slow <= fast {
            return Err(MacdError::SlowNotAboveFast { fast, slow });
        }
        Ok(Self { fast, slow, signal })
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// All MACD components for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub fast: f64,
    pub slow: f64,
    pub dif: f64,
    pub dea: f64,
    pub macd: f64,
}

impl MacdValue {
    /// Value for the first bar of a series: both EMAs start at the close.
    pub fn seed(close: f64) -> Self {
        Self {
            fast: close,
            slow: close,
            dif: 0.0,
            dea: 0.0,
            macd: 0.0,
        }
    }

    /// Value for the bar following `self`.
    pub fn next(&self, close: f64, params: &MacdParams) -> Self {
        let fast = ema_step(self.fast, close, params.fast);
        let slow = ema_step(self.slow, close, params.slow);
        let dif = fast - slow;
        let dea = ema_step(self.dea, dif, params.signal);
        Self {
            fast,
            slow,
            dif,
            dea,
            macd: (dif - dea) * 2.0,
        }
    }
}

/// Compute MACD over a full close series.
pub fn macd_of_series(closes: &[f64], params: &MacdParams) -> Vec<MacdValue> {
    let mut result: Vec<MacdValue> = Vec::with_capacity(closes.len());
    for &close in closes {
        let value = match result.last() {
            Some(prev) => prev.next(close, params),
            None => MacdValue::seed(close),
        };
        result.push(value);
    }
    result
}
