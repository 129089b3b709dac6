//! DIF near zero: buy/sell auxiliary point after a stroke whose MACD DIF
//! made a clear excursion away from zero and then relaxed back to it.
//!
//! With `diffs` the DIF of every raw bar of the last confirmed stroke:
//!
//! ```text
//! std   = population stdev(diffs)
//! delta = std * t / 100
//! buy   = Down stroke, -delta < last < delta, max(diffs) >  |mean| + std
//! sell  = Up stroke,   -delta < last < delta, min(diffs) < -(|mean| + std)
//! ```

use super::{SignalEvaluator, SignalRecord, SignalValue};
use crate::analyze::{Stroke, StrokeAnalyzer};
use crate::cache::OscillatorCache;
use crate::domain::{Bar, Direction, Freq};
use crate::indicators::{stats, MacdParams};

pub const NAME: &str = "dif_near_zero";
pub const VERSION: &str = "V240612";

/// Minimum raw bars in the analyzer window before the oscillator is trusted.
pub const MIN_RAW_BARS: usize = 110;
/// Largest unconfirmed buffer that still counts the last stroke as settled.
pub const MAX_UNCONFIRMED: usize = 7;
/// Minimum raw bars in the last stroke.
pub const MIN_STROKE_BARS: usize = 7;

pub const DEFAULT_T: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct DifNearZero {
    freq: Freq,
    t: u32,
    macd: MacdParams,
}

impl DifNearZero {
    /// `t` is the band width in hundredths of a standard deviation.
    pub fn new(freq: Freq, t: u32) -> Self {
        Self {
            freq,
            t,
            macd: MacdParams::default(),
        }
    }

    pub fn with_macd(mut self, macd: MacdParams) -> Self {
        self.macd = macd;
        self
    }

    pub fn t(&self) -> u32 {
        self.t
    }

    pub fn macd(&self) -> &MacdParams {
        &self.macd
    }

    /// `DIFNearZeroT{t}`, with `M{fast}#{slow}#{signal}` appended when the
    /// MACD periods are not the default 12/26/9.
    fn rule_key(&self) -> String {
        let base = format!("DIFNearZeroT{}", self.t);
        if self.macd == MacdParams::default() {
            base
        } else {
            let m = &self.macd;
            format!("{base}M{}#{}#{}", m.fast, m.slow, m.signal)
        }
    }

    /// Apply the gates and the rule to an analyzer snapshot.
    ///
    /// `dif_of` looks up a bar's DIF; a missing value makes the result
    /// `Other`.
    pub fn classify<F>(
        &self,
        raw_bar_count: usize,
        strokes: &[Stroke],
        unconfirmed_len: usize,
        dif_of: F,
    ) -> SignalValue
    where
        F: Fn(&Bar) -> Option<f64>,
    {
        if raw_bar_count < MIN_RAW_BARS || unconfirmed_len > MAX_UNCONFIRMED {
            return SignalValue::Other;
        }
        let Some(bi) = strokes.last() else {
            return SignalValue::Other;
        };
        let raw = bi.raw_bars();
        if raw.len() < MIN_STROKE_BARS {
            return SignalValue::Other;
        }
        let Some(diffs) = raw.into_iter().map(&dif_of).collect::<Option<Vec<f64>>>() else {
            tracing::warn!(sdt = %bi.sdt(), "DIF missing for stroke bar");
            return SignalValue::Other;
        };
        judge(bi.direction, &diffs, self.t)
    }
}

/// The DIF rule on one stroke's sample.
pub fn judge(direction: Direction, diffs: &[f64], t: u32) -> SignalValue {
    let Some(&last) = diffs.last() else {
        return SignalValue::Other;
    };
    let std = stats::population_std(diffs);
    let delta = std * t as f64 / 100.0;
    let mean_abs = stats::mean(diffs).abs();
    let near_zero = -delta < last && last < delta;
    if !near_zero {
        return SignalValue::Other;
    }

    match direction {
        Direction::Down => match stats::max(diffs) {
            Some(max) if max > mean_abs + std => SignalValue::BuyPoint,
            _ => SignalValue::Other,
        },
        Direction::Up => match stats::min(diffs) {
            Some(min) if min < -(mean_abs + std) => SignalValue::SellPoint,
            _ => SignalValue::Other,
        },
    }
}

impl SignalEvaluator for DifNearZero {
    fn name(&self) -> &str {
        NAME
    }

    fn freq(&self) -> Freq {
        self.freq
    }

    fn keys(&self) -> (String, String, String) {
        (
            self.freq.label().to_string(),
            self.rule_key(),
            format!("BSAux{VERSION}"),
        )
    }

    fn evaluate(&self, analyzer: &StrokeAnalyzer, cache: &mut OscillatorCache) -> SignalRecord {
        let key = cache.ensure(analyzer.raw_bars(), &self.macd);
        let cache = &*cache;
        let value = self.classify(
            analyzer.raw_bars().len(),
            analyzer.strokes(),
            analyzer.unconfirmed().len(),
            |bar| cache.dif(&key, bar.id),
        );
        let (k1, k2, k3) = self.keys();
        SignalRecord::new(k1, k2, k3, value)
    }
}
