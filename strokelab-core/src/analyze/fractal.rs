//! Fractals: three-bar turning points on merged bars.

use super::merge::MergedBar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    Top,
    Bottom,
}

/// Whether the bar after the turning point closed beyond the bar before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Power {
    Strong,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fractal {
    pub mark: Mark,
    pub dt: NaiveDateTime,
    pub high: f64,
    pub low: f64,
    /// Extreme price: the high of a top, the low of a bottom.
    pub value: f64,
    pub power: Power,
    /// The three merged bars forming the pattern; the middle one is the extreme.
    pub elements: Vec<MergedBar>,
}

impl Fractal {
    /// Build a fractal centred on `k2` without checking the pattern.
    pub fn new(mark: Mark, k1: &MergedBar, k2: &MergedBar, k3: &MergedBar) -> Self {
        let (value, strong) = match mark {
            Mark::Top => (k2.high, k3.close < k1.low),
            Mark::Bottom => (k2.low, k3.close > k1.high),
        };
        Self {
            mark,
            dt: k2.dt,
            high: k2.high,
            low: k2.low,
            value,
            power: if strong { Power::Strong } else { Power::Weak },
            elements: vec![k1.clone(), k2.clone(), k3.clone()],
        }
    }

    pub fn first_dt(&self) -> NaiveDateTime {
        self.elements.first().map_or(self.dt, |b| b.dt)
    }

    pub fn last_dt(&self) -> NaiveDateTime {
        self.elements.last().map_or(self.dt, |b| b.dt)
    }
}

/// Detect a top or bottom centred on `k2`.
pub fn check_fx(k1: &MergedBar, k2: &MergedBar, k3: &MergedBar) -> Option<Fractal> {
    if k1.high < k2.high && k2.high > k3.high && k1.low < k2.low && k2.low > k3.low {
        return Some(Fractal::new(Mark::Top, k1, k2, k3));
    }
    if k1.low > k2.low && k2.low < k3.low && k1.high > k2.high && k2.high < k3.high {
        return Some(Fractal::new(Mark::Bottom, k1, k2, k3));
    }
    None
}

/// Scan merged bars for fractals, keeping the sequence top/bottom alternating.
///
/// A fractal with the same mark as the previous one is dropped.
pub fn check_fxs(bars: &[MergedBar]) -> Vec<Fractal> {
    let mut fxs: Vec<Fractal> = Vec::new();
    for w in bars.windows(3) {
        let Some(fx) = check_fx(&w[0], &w[1], &w[2]) else {
            continue;
        };
        match fxs.last() {
            Some(prev) if fxs.len() >= 2 && prev.mark == fx.mark => {
                tracing::debug!(dt = %fx.dt, mark = ?fx.mark, "dropping repeated fractal");
            }
            _ => fxs.push(fx),
        }
    }
    fxs
}
