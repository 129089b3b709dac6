//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = (2 * x[t] + (period - 1) * EMA[t-1]) / (period + 1)
//! Seed: EMA[0] = x[0]. No warmup NaNs, so the recursion can be resumed from
//! any previously computed value.

/// Advance an EMA by one observation.
pub fn ema_step(prev: f64, value: f64, period: usize) -> f64 {
    let n = period as f64;
    (2.0 * value + (n - 1.0) * prev) / (n + 1.0)
}

/// Compute EMA values for a whole series, seeded with the first value.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut prev = None;
    for &v in values {
        let ema = match prev {
            Some(p) => ema_step(p, v, period),
            None => v,
        };
        result.push(ema);
        prev = Some(ema);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_input() {
        let result = ema_of_series(&[100.0, 200.0, 300.0], 1);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 2/(3+1) = 0.5, seed = 10
        // EMA[1] = 0.5*12 + 0.5*10 = 11
        // EMA[2] = 0.5*14 + 0.5*11 = 12.5
        let result = ema_of_series(&[10.0, 12.0, 14.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 11.0, DEFAULT_EPSILON);
        assert_approx(result[2], 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_empty_series_is_empty() {
        assert!(ema_of_series(&[], 12).is_empty());
    }

    #[test]
    fn step_matches_series() {
        let values = [5.0, 7.0, 6.0, 9.0, 11.0];
        let series = ema_of_series(&values, 4);
        let mut prev = values[0];
        for i in 1..values.len() {
            prev = ema_step(prev, values[i], 4);
            assert_approx(prev, series[i], DEFAULT_EPSILON);
        }
    }
}
