//! Incremental stroke analyzer for one symbol at one frequency.

use super::fractal::{check_fxs, Mark};
use super::merge::{remove_include, MergedBar};
use super::stroke::{check_bi, Stroke};
use super::{AnalyzeError, SegmenterConfig};
use crate::domain::{Bar, BarId, Direction, Freq};
use crate::indicators::stats;

/// Bar-by-bar stroke segmenter.
///
/// Every ingested bar is assigned a fresh `BarId`, including a bar that
/// replaces the previous one because it carries the same timestamp.
#[derive(Debug, Clone)]
pub struct StrokeAnalyzer {
    symbol: String,
    freq: Freq,
    config: SegmenterConfig,
    bars_raw: Vec<Bar>,
    bars_ubi: Vec<MergedBar>,
    bi_list: Vec<Stroke>,
    next_id: u64,
}

impl StrokeAnalyzer {
    pub fn new(
        symbol: impl Into<String>,
        freq: Freq,
        config: SegmenterConfig,
    ) -> Result<Self, AnalyzeError> {
        config.validate()?;
        Ok(Self {
            symbol: symbol.into(),
            freq,
            config,
            bars_raw: Vec::new(),
            bars_ubi: Vec::new(),
            bi_list: Vec::new(),
            next_id: 0,
        })
    }

    /// Build an analyzer and feed it every bar in order.
    ///
    /// Symbol and frequency are taken from the first bar.
    pub fn from_bars(bars: &[Bar], config: SegmenterConfig) -> Result<Self, AnalyzeError> {
        let (symbol, freq) = match bars.first() {
            Some(b) => (b.symbol.clone(), b.freq),
            None => (String::new(), Freq::D),
        };
        let mut analyzer = Self::new(symbol, freq, config)?;
        for bar in bars {
            analyzer.update(bar.clone())?;
        }
        Ok(analyzer)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn freq(&self) -> Freq {
        self.freq
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Raw bars from the first bar of the oldest kept stroke onwards.
    pub fn raw_bars(&self) -> &[Bar] {
        &self.bars_raw
    }

    /// Confirmed strokes, oldest first.
    pub fn strokes(&self) -> &[Stroke] {
        &self.bi_list
    }

    pub fn last_stroke(&self) -> Option<&Stroke> {
        self.bi_list.last()
    }

    /// Merged bars not yet absorbed into a confirmed stroke.
    pub fn unconfirmed(&self) -> &[MergedBar] {
        &self.bars_ubi
    }

    /// Feed one bar.
    ///
    /// A bar with the same `dt` as the last raw bar replaces it. Older bars
    /// and bars for another symbol are rejected.
    pub fn update(&mut self, mut bar: Bar) -> Result<(), AnalyzeError> {
        if !self.symbol.is_empty() && bar.symbol != self.symbol {
            return Err(AnalyzeError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: bar.symbol,
            });
        }
        if self.symbol.is_empty() {
            self.symbol = bar.symbol.clone();
        }

        let last_dt = self.bars_raw.last().map(|b| b.dt);
        if let Some(previous) = last_dt {
            if previous > bar.dt {
                return Err(AnalyzeError::OutOfOrder {
                    previous,
                    next: bar.dt,
                });
            }
        }

        bar.id = BarId(self.next_id);
        self.next_id += 1;

        let last_bars = if last_dt == Some(bar.dt) {
            if let Some(last) = self.bars_raw.last_mut() {
                *last = bar.clone();
            }
            let mut elements = self
                .bars_ubi
                .pop()
                .map(|m| m.elements)
                .unwrap_or_default();
            match elements.last_mut() {
                Some(e) if e.dt == bar.dt => *e = bar,
                _ => elements.push(bar),
            }
            elements
        } else {
            self.bars_raw.push(bar.clone());
            vec![bar]
        };

        for raw in &last_bars {
            self.push_merged(raw);
        }

        self.update_bi();
        self.trim_window();
        Ok(())
    }

    fn push_merged(&mut self, bar: &Bar) {
        let n = self.bars_ubi.len();
        if n < 2 {
            self.bars_ubi.push(MergedBar::from_raw(bar));
            return;
        }
        let (included, k3) = remove_include(&self.bars_ubi[n - 2], &self.bars_ubi[n - 1], bar);
        if included {
            self.bars_ubi[n - 1] = k3;
        } else {
            self.bars_ubi.push(k3);
        }
    }

    fn update_bi(&mut self) {
        if self.bars_ubi.len() < 3 {
            return;
        }

        if self.bi_list.is_empty() {
            self.find_first_stroke();
            return;
        }

        let benchmark = self.benchmark();
        let (bi, rest) = check_bi(
            &self.bars_ubi,
            self.config.min_bi_len,
            benchmark,
            self.config.bi_change_th,
        );
        match bi {
            Some(bi) if self.alternates(&bi) => {
                tracing::debug!(
                    symbol = %self.symbol,
                    direction = %bi.direction,
                    sdt = %bi.sdt(),
                    edt = %bi.edt(),
                    bars = bi.length(),
                    "stroke confirmed"
                );
                self.bars_ubi = rest;
                self.bi_list.push(bi);
            }
            Some(bi) => {
                tracing::warn!(
                    symbol = %self.symbol,
                    direction = %bi.direction,
                    sdt = %bi.sdt(),
                    "discarding stroke that does not alternate"
                );
                self.bars_ubi = rest;
            }
            None => self.bars_ubi = rest,
        }

        self.dissolve_broken_stroke();
    }

    fn find_first_stroke(&mut self) {
        let fxs = check_fxs(&self.bars_ubi);
        let Some(first) = fxs.first() else {
            return;
        };

        // Anchor on the most extreme fractal of the first fractal's kind.
        let mut anchor = first;
        for fx in fxs.iter().filter(|fx| fx.mark == first.mark) {
            let more_extreme = match anchor.mark {
                Mark::Bottom => fx.low <= anchor.low,
                Mark::Top => fx.high >= anchor.high,
            };
            if more_extreme {
                anchor = fx;
            }
        }
        let start = anchor.first_dt();

        let bars: Vec<MergedBar> = self
            .bars_ubi
            .iter()
            .filter(|b| b.dt >= start)
            .cloned()
            .collect();
        let (bi, rest) = check_bi(&bars, self.config.min_bi_len, None, self.config.bi_change_th);
        self.bars_ubi = rest;
        if let Some(bi) = bi {
            tracing::debug!(symbol = %self.symbol, direction = %bi.direction, sdt = %bi.sdt(), "first stroke");
            self.bi_list.push(bi);
        }
    }

    fn alternates(&self, bi: &Stroke) -> bool {
        self.bi_list
            .last()
            .map_or(true, |last| last.direction != bi.direction)
    }

    /// Reference move size for the large-move shortcut: the smaller of the
    /// last stroke's move and the mean of the last five.
    fn benchmark(&self) -> Option<f64> {
        if !self.config.change_threshold_enabled() || self.bi_list.len() < 5 {
            return None;
        }
        let last = self.bi_list.last()?.power_price();
        let recent: Vec<f64> = self.bi_list[self.bi_list.len() - 5..]
            .iter()
            .map(|b| b.power_price())
            .collect();
        Some(last.min(stats::mean(&recent)))
    }

    /// If the newest unconfirmed bar breaks the last stroke's extreme, the
    /// stroke was premature: fold its bars back into the buffer and drop it.
    fn dissolve_broken_stroke(&mut self) {
        let (Some(last_bi), Some(last_bar)) = (self.bi_list.last(), self.bars_ubi.last()) else {
            return;
        };
        let broken = match last_bi.direction {
            Direction::Up => last_bar.high > last_bi.high(),
            Direction::Down => last_bar.low < last_bi.low(),
        };
        let n = last_bi.bars.len();
        if !broken || n < 2 {
            return;
        }

        let edge = last_bi.bars[n - 2].dt;
        let mut bars: Vec<MergedBar> = last_bi.bars[..n - 2].to_vec();
        bars.extend(self.bars_ubi.iter().filter(|b| b.dt >= edge).cloned());
        tracing::debug!(symbol = %self.symbol, sdt = %last_bi.sdt(), "stroke broken, dissolving");
        self.bars_ubi = bars;
        self.bi_list.pop();
    }

    fn trim_window(&mut self) {
        if self.bi_list.len() > self.config.max_bi_num {
            let excess = self.bi_list.len() - self.config.max_bi_num;
            self.bi_list.drain(..excess);
        }
        let Some(first) = self.bi_list.first() else {
            return;
        };
        let sdt = first.fx_a.first_dt();
        let start = self
            .bars_raw
            .iter()
            .position(|b| b.dt >= sdt)
            .unwrap_or(0);
        if start > 0 {
            self.bars_raw.drain(..start);
        }
    }
}
