//! Resampling base bars into coarser frequencies.
//!
//! Every resampled bar is labelled with the end of its period: minute buckets
//! by the bucket's closing time, calendar periods by their last day at 00:00.
//! Partial updates of one period therefore share a `dt`, which the analyzer
//! treats as an intra-period replacement.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use strokelab_core::domain::{Bar, BarId, Freq};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("cannot resample {from} bars into finer {to} bars")]
    FinerThanSource { from: Freq, to: Freq },

    #[error("cannot resample into tick bars")]
    TickTarget,

    #[error("period end of {0} is out of range")]
    OutOfRange(NaiveDateTime),

    #[error("bar at {next} is older than the previous bar at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

/// End of the `freq` period containing `dt`.
pub fn period_end(dt: NaiveDateTime, freq: Freq) -> Result<NaiveDateTime, ResampleError> {
    let date = dt.date();
    let midnight = |d: NaiveDate| d.and_time(NaiveTime::default());
    let end = match freq {
        Freq::Tick => return Err(ResampleError::TickTarget),
        Freq::F1 | Freq::F5 | Freq::F15 | Freq::F30 | Freq::F60 => {
            let width = freq.minutes().unwrap_or(1) * 60;
            let secs = dt.time().num_seconds_from_midnight();
            let end_secs = secs.div_ceil(width) * width;
            Some(midnight(date) + Duration::seconds(end_secs as i64))
        }
        Freq::D => Some(midnight(date)),
        Freq::W => {
            let to_sunday = 7 - date.weekday().number_from_monday();
            date.checked_add_signed(Duration::days(to_sunday as i64))
                .map(midnight)
        }
        Freq::M => last_day_of_month(date.year(), date.month()).map(midnight),
        Freq::S => {
            let quarter_end = (date.month() - 1) / 3 * 3 + 3;
            last_day_of_month(date.year(), quarter_end).map(midnight)
        }
        Freq::Y => NaiveDate::from_ymd_opt(date.year(), 12, 31).map(midnight),
    };
    end.ok_or(ResampleError::OutOfRange(dt))
}

fn check_target(base: Freq, target: Freq) -> Result<(), ResampleError> {
    if target == Freq::Tick {
        return Err(ResampleError::TickTarget);
    }
    if target < base {
        return Err(ResampleError::FinerThanSource {
            from: base,
            to: target,
        });
    }
    Ok(())
}

fn open_period(bar: &Bar, freq: Freq, dt: NaiveDateTime) -> Bar {
    Bar {
        id: BarId::default(),
        freq,
        dt,
        ..bar.clone()
    }
}

fn absorb(period: &mut Bar, bar: &Bar) {
    period.high = period.high.max(bar.high);
    period.low = period.low.min(bar.low);
    period.close = bar.close;
    period.vol += bar.vol;
    period.amount += bar.amount;
}

/// Aggregate a whole base series into `freq` bars.
///
/// The last bar may cover an incomplete period.
pub fn resample(bars: &[Bar], freq: Freq) -> Result<Vec<Bar>, ResampleError> {
    let Some(first) = bars.first() else {
        return Ok(Vec::new());
    };
    check_target(first.freq, freq)?;

    let mut out: Vec<Bar> = Vec::new();
    for bar in bars {
        let label = period_end(bar.dt, freq)?;
        match out.last_mut() {
            Some(period) if period.dt == label => absorb(period, bar),
            Some(period) if period.dt > label => {
                return Err(ResampleError::OutOfOrder {
                    previous: period.dt,
                    next: label,
                })
            }
            _ => out.push(open_period(bar, freq, label)),
        }
    }
    Ok(out)
}

/// Incremental resampler: after each base bar, emits the current (possibly
/// partial) bar of every target frequency.
#[derive(Debug, Clone)]
pub struct BarGenerator {
    base: Freq,
    current: BTreeMap<Freq, Bar>,
    targets: Vec<Freq>,
    last_dt: Option<NaiveDateTime>,
}

impl BarGenerator {
    pub fn new(base: Freq, targets: &[Freq]) -> Result<Self, ResampleError> {
        let mut uniq: Vec<Freq> = targets.to_vec();
        uniq.sort();
        uniq.dedup();
        for &t in &uniq {
            check_target(base, t)?;
        }
        Ok(Self {
            base,
            current: BTreeMap::new(),
            targets: uniq,
            last_dt: None,
        })
    }

    pub fn base(&self) -> Freq {
        self.base
    }

    pub fn targets(&self) -> &[Freq] {
        &self.targets
    }

    /// Fold one base bar into every target and return the current bars,
    /// in ascending frequency order.
    pub fn update(&mut self, bar: &Bar) -> Result<Vec<Bar>, ResampleError> {
        if let Some(previous) = self.last_dt {
            if bar.dt < previous {
                return Err(ResampleError::OutOfOrder {
                    previous,
                    next: bar.dt,
                });
            }
        }
        self.last_dt = Some(bar.dt);

        let mut out = Vec::with_capacity(self.targets.len());
        for &freq in &self.targets {
            let label = period_end(bar.dt, freq)?;
            let period = match self.current.get_mut(&freq) {
                Some(period) if period.dt == label => {
                    absorb(period, bar);
                    period.clone()
                }
                _ => {
                    let period = open_period(bar, freq, label);
                    self.current.insert(freq, period.clone());
                    period
                }
            };
            out.push(period);
        }
        Ok(out)
    }
}

/// Guess a series' sampling frequency from the smallest gap between
/// consecutive timestamps. `None` with fewer than two distinct timestamps.
pub fn infer_base_freq(dts: &[NaiveDateTime]) -> Option<Freq> {
    let gap = dts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .filter(|&s| s > 0)
        .min()?;
    let freq = match gap {
        s if s < 60 => Freq::Tick,
        s if s <= 60 => Freq::F1,
        s if s <= 5 * 60 => Freq::F5,
        s if s <= 15 * 60 => Freq::F15,
        s if s <= 30 * 60 => Freq::F30,
        s if s <= 60 * 60 => Freq::F60,
        s if s < 5 * 86_400 => Freq::D,
        s if s < 28 * 86_400 => Freq::W,
        s if s < 89 * 86_400 => Freq::M,
        s if s < 365 * 86_400 => Freq::S,
        _ => Freq::Y,
    };
    Some(freq)
}
