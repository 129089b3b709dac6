//! Parquet bar store.
//!
//! Layout: `{root}/{group}/{symbol}.parquet`, one file per symbol holding its
//! base-frequency bars. Columns: `dt` (or `datetime`), `open`, `high`, `low`,
//! `close`, `vol` (or `volume`) and optionally `amount`. Prices are stored
//! already adjusted; the store records which adjustment its files carry.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strokelab_core::domain::{Bar, BarId, Freq};
use thiserror::Error;

use crate::resample::{infer_base_freq, resample, ResampleError};

/// Price adjustment applied to stored bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    None,
    Forward,
    #[default]
    Backward,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Adjustment::None => "none",
            Adjustment::Forward => "forward",
            Adjustment::Backward => "backward",
        })
    }
}

impl FromStr for Adjustment {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(Adjustment::None),
            "forward" | "qfq" => Ok(Adjustment::Forward),
            "backward" | "hfq" => Ok(Adjustment::Backward),
            other => Err(StoreError::Schema(format!("unknown adjustment '{other}'"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("symbol '{symbol}' not found under {}", .root.display())]
    SymbolNotFound { symbol: String, root: PathBuf },

    #[error("group '{group}' not found under {}", .root.display())]
    GroupNotFound { group: String, root: PathBuf },

    #[error("store holds {stored}-adjusted prices, {requested} requested")]
    AdjustmentUnavailable {
        requested: Adjustment,
        stored: Adjustment,
    },

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn parquet_err(context: &'static str) -> impl Fn(PolarsError) -> StoreError {
    move |e| StoreError::Parquet(format!("{context}: {e}"))
}

/// Read access to a directory of per-symbol parquet files.
#[derive(Debug, Clone)]
pub struct BarStore {
    root: PathBuf,
    group: Option<String>,
    adjustment: Adjustment,
}

impl BarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            group: None,
            adjustment: Adjustment::default(),
        }
    }

    /// Restrict symbol lookup to one group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Declare the adjustment the stored prices carry.
    pub fn with_adjustment(mut self, adjustment: Adjustment) -> Self {
        self.adjustment = adjustment;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    fn symbol_path(&self, group: &str, symbol: &str) -> PathBuf {
        self.group_dir(group).join(format!("{symbol}.parquet"))
    }

    /// Group directories under the root, sorted.
    pub fn groups(&self) -> Result<BTreeSet<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(io_err(&self.root))?;
        let mut groups = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&self.root))?;
            if entry.path().is_dir() {
                groups.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(groups)
    }

    /// Symbols with a parquet file in `group`.
    pub fn list_symbols(&self, group: &str) -> Result<BTreeSet<String>, StoreError> {
        let dir = self.group_dir(group);
        if !dir.is_dir() {
            return Err(StoreError::GroupNotFound {
                group: group.to_string(),
                root: self.root.clone(),
            });
        }
        let mut symbols = BTreeSet::new();
        for entry in fs::read_dir(&dir).map_err(io_err(&dir))? {
            let path = entry.map_err(io_err(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.insert(stem.to_string());
            }
        }
        Ok(symbols)
    }

    /// File holding `symbol`: the configured group, else the first group
    /// (in sorted order) that has it.
    pub fn locate(&self, symbol: &str) -> Result<PathBuf, StoreError> {
        let not_found = || StoreError::SymbolNotFound {
            symbol: symbol.to_string(),
            root: self.root.clone(),
        };
        if let Some(group) = &self.group {
            let path = self.symbol_path(group, symbol);
            return if path.is_file() { Ok(path) } else { Err(not_found()) };
        }
        if !self.root.is_dir() {
            return Err(not_found());
        }
        self.groups()?
            .iter()
            .map(|g| self.symbol_path(g, symbol))
            .find(|p| p.is_file())
            .ok_or_else(not_found)
    }

    /// Load `symbol` between `start` and `end` (both inclusive, whole days)
    /// and resample it to `freq`.
    ///
    /// The file's own frequency is inferred from its timestamps; asking for
    /// a finer frequency is an error.
    pub fn load_bars(
        &self,
        symbol: &str,
        freq: Freq,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        adjustment: Adjustment,
    ) -> Result<Vec<Bar>, StoreError> {
        if adjustment != self.adjustment {
            return Err(StoreError::AdjustmentUnavailable {
                requested: adjustment,
                stored: self.adjustment,
            });
        }
        let path = self.locate(symbol)?;
        let mut bars = read_parquet_bars(&path, symbol)?;

        let lo = start.map(|d| d.and_time(Default::default()));
        let hi = end.map(|d| d.and_time(Default::default()) + Duration::days(1));
        bars.retain(|b| lo.map_or(true, |lo| b.dt >= lo) && hi.map_or(true, |hi| b.dt < hi));

        let base = bars.first().map_or(freq, |b| b.freq);
        let out = if base == freq {
            bars
        } else {
            resample(&bars, freq)?
        };
        tracing::info!(
            symbol,
            path = %path.display(),
            base = %base,
            freq = %freq,
            bars = out.len(),
            "loaded bars"
        );
        Ok(out)
    }

    /// Write bars as `{root}/{group}/{symbol}.parquet`, atomically.
    pub fn write_bars(&self, group: &str, symbol: &str, bars: &[Bar]) -> Result<PathBuf, StoreError> {
        let dir = self.group_dir(group);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = self.symbol_path(group, symbol);
        let tmp = path.with_extension("parquet.tmp");

        let mut df = bars_to_dataframe(bars)?;
        let file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(parquet_err("write parquet"))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io {
                path: path.clone(),
                source: e,
            }
        })?;
        tracing::debug!(symbol, path = %path.display(), bars = bars.len(), "wrote bars");
        Ok(path)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, StoreError> {
    let dts: Vec<i64> = bars.iter().map(|b| b.dt.and_utc().timestamp_millis()).collect();
    let symbols: Vec<&str> = bars.iter().map(|b| b.symbol.as_str()).collect();
    let col = |name: &str, f: fn(&Bar) -> f64| {
        Column::new(name.into(), bars.iter().map(f).collect::<Vec<f64>>())
    };

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("dt".into(), dts)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(parquet_err("dt cast"))?,
        col("open", |b: &Bar| b.open),
        col("high", |b: &Bar| b.high),
        col("low", |b: &Bar| b.low),
        col("close", |b: &Bar| b.close),
        col("vol", |b: &Bar| b.vol),
        col("amount", |b: &Bar| b.amount),
    ])
    .map_err(parquet_err("dataframe creation"))
}

fn find_column<'a>(df: &'a DataFrame, names: &[&str]) -> Option<&'a Column> {
    names.iter().find_map(|n| df.column(n).ok())
}

fn float_column(df: &DataFrame, names: &[&str]) -> Result<Option<Vec<Option<f64>>>, StoreError> {
    let Some(col) = find_column(df, names) else {
        return Ok(None);
    };
    let cast = col
        .cast(&DataType::Float64)
        .map_err(parquet_err("numeric cast"))?;
    let ca = cast.f64().map_err(parquet_err("numeric column"))?;
    Ok(Some(ca.into_iter().collect()))
}

fn require(
    values: Option<Vec<Option<f64>>>,
    name: &str,
) -> Result<Vec<Option<f64>>, StoreError> {
    values.ok_or_else(|| StoreError::Schema(format!("missing column '{name}'")))
}

/// Timestamps from a `dt`/`datetime` column of any temporal or string type.
fn datetime_column(df: &DataFrame) -> Result<Vec<Option<NaiveDateTime>>, StoreError> {
    let col = find_column(df, &["dt", "datetime"])
        .ok_or_else(|| StoreError::Schema("missing column 'dt' or 'datetime'".into()))?;

    if matches!(col.dtype(), DataType::String) {
        let ca = col.str().map_err(parquet_err("dt column"))?;
        return Ok(ca.into_iter().map(|s| s.and_then(parse_datetime)).collect());
    }

    let millis = col
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(parquet_err("dt cast"))?;
    let ca = millis.i64().map_err(parquet_err("dt column"))?;
    Ok(ca
        .into_iter()
        .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|d| d.naive_utc()))
        .collect())
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(Default::default()))
        })
}

/// Read a store file into bars sorted by `dt`, tagged with the inferred base
/// frequency (daily for a single row). Rows with a missing timestamp or price
/// are skipped.
pub fn read_parquet_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, StoreError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read"))?;

    let dts = datetime_column(&df)?;
    let open = require(float_column(&df, &["open"])?, "open")?;
    let high = require(float_column(&df, &["high"])?, "high")?;
    let low = require(float_column(&df, &["low"])?, "low")?;
    let close = require(float_column(&df, &["close"])?, "close")?;
    let vol = require(float_column(&df, &["vol", "volume"])?, "vol")?;
    let amount = float_column(&df, &["amount"])?;

    let mut bars = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        let row = (dts[i], open[i], high[i], low[i], close[i]);
        let (Some(dt), Some(open), Some(high), Some(low), Some(close)) = row else {
            skipped += 1;
            continue;
        };
        let bar = Bar {
            id: BarId(i as u64),
            symbol: symbol.to_string(),
            freq: Freq::D,
            dt,
            open,
            high,
            low,
            close,
            vol: vol[i].unwrap_or(0.0),
            amount: amount.as_ref().and_then(|a| a[i]).unwrap_or(0.0),
        };
        if bar.is_void() {
            skipped += 1;
            continue;
        }
        bars.push(bar);
    }
    if skipped > 0 {
        tracing::warn!(symbol, path = %path.display(), skipped, "skipped malformed rows");
    }

    bars.sort_by_key(|b| b.dt);
    let dts: Vec<NaiveDateTime> = bars.iter().map(|b| b.dt).collect();
    let base = infer_base_freq(&dts).unwrap_or(Freq::D);
    for bar in &mut bars {
        bar.freq = base;
    }
    Ok(bars)
}
