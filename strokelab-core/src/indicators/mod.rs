//! Indicator math used by the oscillator cache and the signal rules.
//!
//! Everything here is a pure function of its input slice. Memoization
//! across evaluations lives in `crate::cache`, not here.

pub mod ema;
pub mod macd;
pub mod stats;

pub use ema::{ema_of_series, ema_step};
pub use macd::{macd_of_series, MacdError, MacdParams, MacdValue};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
