//! Signal replay: feed base bars one at a time and evaluate after each.
//!
//! Base bars are resampled incrementally into every signal's frequency. Each
//! frequency gets its own lane (analyzer + oscillator cache); every signal is
//! evaluated after each base bar, so a signal on a coarse frequency sees the
//! partial bar of the current period exactly as it would live.
//!
//! The report carries every non-`other` event, label counts over all
//! evaluations, and a forward-return hit rate: a buy point hits when the
//! close `horizon` bars (of the signal's frequency) later is higher than the
//! close at the event, a sell point when it is lower.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use strokelab_core::analyze::{AnalyzeError, SegmenterConfig, StrokeAnalyzer};
use strokelab_core::cache::OscillatorCache;
use strokelab_core::domain::{Bar, Freq};
use strokelab_core::signal::{
    RegistryError, SignalConfig, SignalEvaluator, SignalRegistry, SignalValue,
};

use crate::resample::{BarGenerator, ResampleError};
use crate::store::{Adjustment, BarStore, StoreError};

/// Default number of signal-frequency bars used for forward returns.
pub const DEFAULT_HORIZON: usize = 5;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("analyzer error: {0}")]
    Analyze(#[from] AnalyzeError),
    #[error("resample error: {0}")]
    Resample(#[from] ResampleError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("no signals to replay")]
    NoSignals,
    #[error("signal key '{0}' is configured more than once")]
    DuplicateKey(String),
}

/// Replay settings shared by every symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayOptions {
    pub segmenter: SegmenterConfig,
    pub horizon: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            horizon: DEFAULT_HORIZON,
        }
    }
}

/// One non-`other` evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    /// Timestamp of the base bar that triggered the evaluation.
    pub dt: NaiveDateTime,
    /// Period label of the signal-frequency bar at the time of the event.
    pub period: NaiveDateTime,
    pub freq: Freq,
    /// Canonical signal string.
    pub signal: String,
    pub key: String,
    pub value: SignalValue,
    pub close: f64,
    pub forward_return: Option<f64>,
    pub hit: Option<bool>,
    /// Position of `period` in the signal-frequency series.
    #[serde(skip)]
    pub period_index: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub buy_point: usize,
    pub sell_point: usize,
    pub other: usize,
}

impl LabelCounts {
    fn add(&mut self, value: SignalValue) {
        match value {
            SignalValue::BuyPoint => self.buy_point += 1,
            SignalValue::SellPoint => self.sell_point += 1,
            SignalValue::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.buy_point + self.sell_point + self.other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRate {
    pub evaluated: usize,
    pub hits: usize,
}

impl HitRate {
    /// Fraction of events that hit, `None` when nothing could be evaluated.
    pub fn rate(&self) -> Option<f64> {
        if self.evaluated == 0 {
            None
        } else {
            Some(self.hits as f64 / self.evaluated as f64)
        }
    }
}

/// Result of replaying one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub symbol: String,
    pub base_freq: Freq,
    pub bars: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub horizon: usize,
    /// Label counts per signal key, over every evaluation.
    pub counts: BTreeMap<String, LabelCounts>,
    /// Forward-return hit rate per signal key.
    pub hits: BTreeMap<String, HitRate>,
    pub events: Vec<SignalEvent>,
}

impl ReplayReport {
    pub fn events_for(&self, key: &str) -> impl Iterator<Item = &SignalEvent> {
        let key = key.to_string();
        self.events.iter().filter(move |e| e.key == key)
    }
}

// ─── Lanes ──────────────────────────────────────────────────────────

struct Lane {
    analyzer: StrokeAnalyzer,
    cache: OscillatorCache,
    /// Final close of every period seen so far, by period label.
    closes: Vec<(NaiveDateTime, f64)>,
}

impl Lane {
    fn new(symbol: &str, freq: Freq, segmenter: SegmenterConfig) -> Result<Self, AnalyzeError> {
        Ok(Self {
            analyzer: StrokeAnalyzer::new(symbol, freq, segmenter)?,
            cache: OscillatorCache::new(),
            closes: Vec::new(),
        })
    }

    fn update(&mut self, bar: Bar) -> Result<(), AnalyzeError> {
        match self.closes.last_mut() {
            Some((dt, close)) if *dt == bar.dt => *close = bar.close,
            _ => self.closes.push((bar.dt, bar.close)),
        }
        self.analyzer.update(bar)?;
        if let Some(first) = self.analyzer.raw_bars().first() {
            self.cache.prune_before(first.id);
        }
        Ok(())
    }
}

fn fill_forward_returns(events: &mut [SignalEvent], lanes: &BTreeMap<Freq, Lane>, horizon: usize) {
    for event in events.iter_mut() {
        let Some(lane) = lanes.get(&event.freq) else {
            continue;
        };
        let Some(&(_, future)) = lane.closes.get(event.period_index + horizon) else {
            continue;
        };
        if horizon == 0 || event.close == 0.0 {
            continue;
        }
        event.forward_return = Some(future / event.close - 1.0);
        event.hit = match event.value {
            SignalValue::BuyPoint => Some(future > event.close),
            SignalValue::SellPoint => Some(future < event.close),
            SignalValue::Other => None,
        };
    }
}

// ─── Replay ─────────────────────────────────────────────────────────

/// Replay `evaluators` over one symbol's base bars.
///
/// Every evaluator's frequency must be at least as coarse as the base bars'.
/// Within one period an event is recorded when the label first appears or
/// changes; counts include every evaluation.
pub fn replay(
    symbol: &str,
    base: &[Bar],
    evaluators: &[Box<dyn SignalEvaluator>],
    opts: &ReplayOptions,
) -> Result<ReplayReport, ReplayError> {
    if evaluators.is_empty() {
        return Err(ReplayError::NoSignals);
    }
    opts.segmenter.validate()?;

    let base_freq = base.first().map_or(Freq::D, |b| b.freq);
    let freqs: Vec<Freq> = evaluators.iter().map(|e| e.freq()).collect();
    let mut generator = BarGenerator::new(base_freq, &freqs)?;

    let mut lanes: BTreeMap<Freq, Lane> = BTreeMap::new();
    for &freq in generator.targets() {
        lanes.insert(freq, Lane::new(symbol, freq, opts.segmenter)?);
    }

    let keys: Vec<String> = evaluators
        .iter()
        .map(|e| {
            let (k1, k2, k3) = e.keys();
            format!("{k1}_{k2}_{k3}")
        })
        .collect();
    let mut counts: BTreeMap<String, LabelCounts> = BTreeMap::new();
    for key in &keys {
        if counts.insert(key.clone(), LabelCounts::default()).is_some() {
            return Err(ReplayError::DuplicateKey(key.clone()));
        }
    }
    let mut last_seen: Vec<Option<(NaiveDateTime, SignalValue)>> = vec![None; evaluators.len()];
    let mut events = Vec::new();

    for bar in base {
        for period in generator.update(bar)? {
            if let Some(lane) = lanes.get_mut(&period.freq) {
                lane.update(period)?;
            }
        }

        for (i, eval) in evaluators.iter().enumerate() {
            let Some(lane) = lanes.get_mut(&eval.freq()) else {
                continue;
            };
            let record = eval.evaluate(&lane.analyzer, &mut lane.cache);
            if let Some(c) = counts.get_mut(&keys[i]) {
                c.add(record.value);
            }

            let Some(&(period, close)) = lane.closes.last() else {
                continue;
            };
            let previous = last_seen[i].replace((period, record.value));
            if record.value == SignalValue::Other || previous == Some((period, record.value)) {
                continue;
            }
            tracing::debug!(
                symbol,
                dt = %bar.dt,
                signal = %record,
                "signal fired"
            );
            events.push(SignalEvent {
                symbol: symbol.to_string(),
                dt: bar.dt,
                period,
                freq: eval.freq(),
                signal: record.to_string(),
                key: record.key(),
                value: record.value,
                close,
                forward_return: None,
                hit: None,
                period_index: lane.closes.len() - 1,
            });
        }
    }

    fill_forward_returns(&mut events, &lanes, opts.horizon);

    let mut hits: BTreeMap<String, HitRate> =
        keys.iter().map(|k| (k.clone(), HitRate::default())).collect();
    for event in &events {
        if let (Some(hit), Some(rate)) = (event.hit, hits.get_mut(&event.key)) {
            rate.evaluated += 1;
            if hit {
                rate.hits += 1;
            }
        }
    }

    tracing::info!(
        symbol,
        base_freq = %base_freq,
        bars = base.len(),
        events = events.len(),
        "replay finished"
    );

    Ok(ReplayReport {
        symbol: symbol.to_string(),
        base_freq,
        bars: base.len(),
        start: base.first().map(|b| b.dt),
        end: base.last().map(|b| b.dt),
        horizon: opts.horizon,
        counts,
        hits,
        events,
    })
}

/// Where and how to load the bars for a group replay.
#[derive(Debug, Clone, Copy)]
pub struct GroupSource<'a> {
    pub store: &'a BarStore,
    pub group: &'a str,
    pub base_freq: Freq,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub adjustment: Adjustment,
}

/// Replay every symbol of a group in parallel.
///
/// Signals are built once to surface config errors up front; each symbol
/// then gets its own evaluators, analyzers and caches. Per-symbol failures
/// are returned alongside the successes, in symbol order.
pub fn replay_group(
    source: &GroupSource<'_>,
    configs: &[SignalConfig],
    registry: &SignalRegistry,
    opts: &ReplayOptions,
) -> Result<Vec<(String, Result<ReplayReport, ReplayError>)>, ReplayError> {
    registry.create_all(configs)?;
    let store = source.store.clone().with_group(source.group);
    let symbols: Vec<String> = store.list_symbols(source.group)?.into_iter().collect();
    tracing::info!(group = source.group, symbols = symbols.len(), "replaying group");

    let results = symbols
        .par_iter()
        .map(|symbol| {
            let result = replay_symbol(&store, source, symbol, configs, registry, opts);
            if let Err(e) = &result {
                tracing::warn!(symbol = %symbol, error = %e, "replay failed");
            }
            (symbol.clone(), result)
        })
        .collect();
    Ok(results)
}

fn replay_symbol(
    store: &BarStore,
    source: &GroupSource<'_>,
    symbol: &str,
    configs: &[SignalConfig],
    registry: &SignalRegistry,
    opts: &ReplayOptions,
) -> Result<ReplayReport, ReplayError> {
    let evaluators = registry.create_all(configs)?;
    let bars = store.load_bars(
        symbol,
        source.base_freq,
        source.start,
        source.end,
        source.adjustment,
    )?;
    replay(symbol, &bars, &evaluators, opts)
}
