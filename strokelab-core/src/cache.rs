//! Oscillator cache: memoized MACD values in a side table.
//!
//! Values are keyed by `(CacheKey, BarId)`. The key is derived from the MACD
//! parameters, so two parameterizations can never share an entry. Entries are
//! write-once: `ensure` only computes bars that have no value yet, and resumes
//! the EMA recursion from the preceding bar's cached value.

use crate::domain::{Bar, BarId};
use crate::indicators::{MacdParams, MacdValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Cache key naming an indicator parameterization, e.g. `MACD12#26#9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn macd(params: &MacdParams) -> Self {
        Self(format!(
            "MACD{}#{}#{}",
            params.fast, params.slow, params.signal
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side table of MACD values for one bar series.
#[derive(Debug, Clone, Default)]
pub struct OscillatorCache {
    tables: HashMap<CacheKey, HashMap<BarId, MacdValue>>,
    computed: usize,
}

impl OscillatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure every bar in `bars` has a MACD value under `params`.
    ///
    /// `bars` must be in series order. A bar whose predecessor in `bars` is
    /// cached continues that bar's recursion; the first uncached bar with no
    /// cached predecessor seeds a new one. Already cached bars are untouched.
    pub fn ensure(&mut self, bars: &[Bar], params: &MacdParams) -> CacheKey {
        let key = CacheKey::macd(params);
        let table = self.tables.entry(key.clone()).or_default();

        let mut prev: Option<MacdValue> = None;
        let mut computed = 0usize;
        for bar in bars {
            if let Some(cached) = table.get(&bar.id) {
                prev = Some(*cached);
                continue;
            }
            let value = match prev {
                Some(p) => p.next(bar.close, params),
                None => MacdValue::seed(bar.close),
            };
            table.insert(bar.id, value);
            prev = Some(value);
            computed += 1;
        }

        if computed > 0 {
            tracing::trace!(key = %key, computed, total = table.len(), "oscillator cache filled");
        }
        self.computed += computed;
        key
    }

    pub fn get(&self, key: &CacheKey, id: BarId) -> Option<&MacdValue> {
        self.tables.get(key).and_then(|t| t.get(&id))
    }

    /// DIF value for a bar, if cached.
    pub fn dif(&self, key: &CacheKey, id: BarId) -> Option<f64> {
        self.get(key, id).map(|v| v.dif)
    }

    /// Total number of values computed over the cache's lifetime.
    pub fn computed(&self) -> usize {
        self.computed
    }

    /// Number of bars cached under `key`.
    pub fn len(&self, key: &CacheKey) -> usize {
        self.tables.get(key).map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|t| t.is_empty())
    }

    /// Drop entries for bars older than `first`.
    ///
    /// Used after the analyzer trims its raw-bar window; the value of `first`
    /// itself is kept so the recursion can continue from it.
    pub fn prune_before(&mut self, first: BarId) {
        for table in self.tables.values_mut() {
            table.retain(|id, _| *id >= first);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, macd_of_series, DEFAULT_EPSILON};
    use crate::test_support::make_bars;

    #[test]
    fn key_encodes_parameters() {
        let a = CacheKey::macd(&MacdParams::default());
        let b = CacheKey::macd(&MacdParams::new(5, 34, 5).unwrap());
        assert_eq!(a.as_str(), "MACD12#26#9");
        assert_ne!(a, b);
    }

    #[test]
    fn ensure_matches_batch_macd() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let params = MacdParams::default();
        let mut cache = OscillatorCache::new();
        let key = cache.ensure(&bars, &params);

        let expected = macd_of_series(&closes, &params);
        for (bar, exp) in bars.iter().zip(&expected) {
            let got = cache.get(&key, bar.id).unwrap();
            assert_approx(got.dif, exp.dif, DEFAULT_EPSILON);
            assert_approx(got.dea, exp.dea, DEFAULT_EPSILON);
        }
        assert_eq!(cache.computed(), 80);
        assert_eq!(cache.len(&key), 80);
    }

    #[test]
    fn second_ensure_is_noop() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 11.5, 13.0]);
        let params = MacdParams::default();
        let mut cache = OscillatorCache::new();
        let key = cache.ensure(&bars, &params);
        let before: Vec<MacdValue> = bars.iter().map(|b| *cache.get(&key, b.id).unwrap()).collect();

        let key2 = cache.ensure(&bars, &params);
        assert_eq!(key, key2);
        assert_eq!(cache.computed(), 5);
        let after: Vec<MacdValue> = bars.iter().map(|b| *cache.get(&key, b.id).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn incremental_ensure_continues_recursion() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + ((i * 13) % 7) as f64).collect();
        let bars = make_bars(&closes);
        let params = MacdParams::default();

        let mut cache = OscillatorCache::new();
        cache.ensure(&bars[..25], &params);
        let key = cache.ensure(&bars, &params);
        assert_eq!(cache.computed(), 40);

        let expected = macd_of_series(&closes, &params);
        assert_approx(
            cache.dif(&key, bars[39].id).unwrap(),
            expected[39].dif,
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn parameterizations_do_not_collide() {
        let bars = make_bars(&[10.0, 12.0, 15.0, 14.0, 18.0, 21.0]);
        let mut cache = OscillatorCache::new();
        let a = cache.ensure(&bars, &MacdParams::default());
        let b = cache.ensure(&bars, &MacdParams::new(2, 3, 2).unwrap());
        assert_ne!(a, b);
        assert_eq!(cache.computed(), 12);
        assert_ne!(cache.dif(&a, bars[5].id), cache.dif(&b, bars[5].id));
    }

    #[test]
    fn prune_keeps_window() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let mut cache = OscillatorCache::new();
        let key = cache.ensure(&bars, &MacdParams::default());
        cache.prune_before(bars[2].id);
        assert_eq!(cache.len(&key), 2);
        assert!(cache.dif(&key, bars[1].id).is_none());
        assert!(cache.dif(&key, bars[2].id).is_some());

        // Re-ensuring the trimmed window computes nothing new.
        cache.ensure(&bars[2..], &MacdParams::default());
        assert_eq!(cache.computed(), 4);
    }

    #[test]
    fn missing_key_reads_none() {
        let cache = OscillatorCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.dif(&CacheKey::macd(&MacdParams::default()), BarId(0)), None);
    }
}
