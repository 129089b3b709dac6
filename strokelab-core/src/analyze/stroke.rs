//! Strokes: directional segments between two opposite fractals.

use super::fractal::{check_fxs, Fractal, Mark};
use super::merge::MergedBar;
use super::AnalyzeError;
use crate::domain::{Bar, Direction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A confirmed stroke.
///
/// An Up stroke runs from a bottom fractal (`fx_a`) to a top fractal (`fx_b`);
/// a Down stroke from a top to a bottom. `bars` covers the merged bars from
/// the first element of `fx_a` to the last element of `fx_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub direction: Direction,
    pub fx_a: Fractal,
    pub fx_b: Fractal,
    /// Every fractal inside the stroke, including both endpoints.
    pub fxs: Vec<Fractal>,
    pub bars: Vec<MergedBar>,
}

impl Stroke {
    pub fn new(
        direction: Direction,
        fx_a: Fractal,
        fx_b: Fractal,
        fxs: Vec<Fractal>,
        bars: Vec<MergedBar>,
    ) -> Result<Self, AnalyzeError> {
        let expected = match direction {
            Direction::Up => (Mark::Bottom, Mark::Top),
            Direction::Down => (Mark::Top, Mark::Bottom),
        };
        if (fx_a.mark, fx_b.mark) != expected {
            return Err(AnalyzeError::FractalMismatch {
                direction,
                start: fx_a.mark,
                end: fx_b.mark,
            });
        }
        if bars.len() < 3 {
            return Err(AnalyzeError::StrokeTooShort(bars.len()));
        }
        if fx_b.dt <= fx_a.dt {
            return Err(AnalyzeError::OutOfOrder {
                previous: fx_a.dt,
                next: fx_b.dt,
            });
        }
        Ok(Self {
            direction,
            fx_a,
            fx_b,
            fxs,
            bars,
        })
    }

    pub fn sdt(&self) -> NaiveDateTime {
        self.fx_a.dt
    }

    pub fn edt(&self) -> NaiveDateTime {
        self.fx_b.dt
    }

    pub fn high(&self) -> f64 {
        self.fx_a.high.max(self.fx_b.high)
    }

    pub fn low(&self) -> f64 {
        self.fx_a.low.min(self.fx_b.low)
    }

    /// Absolute price move between the two fractal extremes.
    pub fn power_price(&self) -> f64 {
        (self.fx_b.value - self.fx_a.value).abs()
    }

    /// Number of merged bars.
    pub fn length(&self) -> usize {
        self.bars.len()
    }

    /// Raw bars from the starting extreme to the ending extreme, inclusive.
    ///
    /// The first and last merged bars only belong to the bounding fractals'
    /// outer legs and are excluded.
    pub fn raw_bars(&self) -> Vec<&Bar> {
        let n = self.bars.len();
        if n < 3 {
            return Vec::new();
        }
        self.bars[1..n - 1]
            .iter()
            .flat_map(|b| b.elements.iter())
            .collect()
    }
}

/// Try to form a stroke at the start of `bars`.
///
/// Returns the stroke, if any, and the merged bars that remain unconfirmed.
/// `benchmark` is the reference move size used with `change_th` to accept a
/// short but large stroke; pass `None` to disable that shortcut.
pub fn check_bi(
    bars: &[MergedBar],
    min_bi_len: usize,
    benchmark: Option<f64>,
    change_th: f64,
) -> (Option<Stroke>, Vec<MergedBar>) {
    let fxs = check_fxs(bars);
    if fxs.len() < 2 {
        return (None, bars.to_vec());
    }

    let fx_a = &fxs[0];
    let (direction, fx_b) = match fx_a.mark {
        Mark::Bottom => {
            let best = fxs
                .iter()
                .filter(|fx| fx.mark == Mark::Top && fx.dt > fx_a.dt && fx.value > fx_a.value)
                .fold(None, |best: Option<&Fractal>, fx| match best {
                    Some(b) if b.high >= fx.high => Some(b),
                    _ => Some(fx),
                });
            (Direction::Up, best)
        }
        Mark::Top => {
            let best = fxs
                .iter()
                .filter(|fx| fx.mark == Mark::Bottom && fx.dt > fx_a.dt && fx.value < fx_a.value)
                .fold(None, |best: Option<&Fractal>, fx| match best {
                    Some(b) if b.low <= fx.low => Some(b),
                    _ => Some(fx),
                });
            (Direction::Down, best)
        }
    };
    let Some(fx_b) = fx_b else {
        return (None, bars.to_vec());
    };

    let (a_start, b_start, b_end) = (fx_a.first_dt(), fx_b.first_dt(), fx_b.last_dt());
    let bars_a: Vec<MergedBar> = bars
        .iter()
        .filter(|x| a_start <= x.dt && x.dt <= b_end)
        .cloned()
        .collect();

    let ab_include = (fx_a.high > fx_b.high && fx_a.low < fx_b.low)
        || (fx_a.high < fx_b.high && fx_a.low > fx_b.low);
    let power_enough = benchmark.is_some_and(|b| (fx_a.value - fx_b.value).abs() > b * change_th);

    if ab_include || (bars_a.len() < min_bi_len && !power_enough) {
        return (None, bars.to_vec());
    }

    let inner: Vec<Fractal> = fxs
        .iter()
        .filter(|x| a_start <= x.dt && x.dt <= b_end)
        .cloned()
        .collect();
    let rest: Vec<MergedBar> = bars.iter().filter(|x| x.dt >= b_start).cloned().collect();

    match Stroke::new(direction, fx_a.clone(), fx_b.clone(), inner, bars_a) {
        Ok(stroke) => (Some(stroke), rest),
        Err(e) => {
            tracing::warn!(error = %e, "rejected malformed stroke");
            (None, bars.to_vec())
        }
    }
}
