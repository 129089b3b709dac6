//! Synthetic bar builders shared by unit tests.

use crate::domain::{Bar, BarId, Freq};
use chrono::{Duration, NaiveDate, NaiveDateTime};

pub fn base_dt() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

/// Create synthetic 30-minute bars from close prices.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                id: BarId(i as u64),
                symbol: "TEST".to_string(),
                freq: Freq::F30,
                dt: base_dt() + Duration::minutes(30 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                vol: 1000.0,
                amount: 1000.0 * close,
            }
        })
        .collect()
}

/// Bars around a mid price with a fixed half-range: high = mid + 0.5, low = mid - 0.5.
pub fn bars_from_mids(mids: &[f64]) -> Vec<Bar> {
    mids.iter()
        .enumerate()
        .map(|(i, &mid)| Bar {
            id: BarId(i as u64),
            symbol: "TEST".to_string(),
            freq: Freq::F30,
            dt: base_dt() + Duration::minutes(30 * i as i64),
            open: mid,
            high: mid + 0.5,
            low: mid - 0.5,
            close: mid,
            vol: 1000.0,
            amount: 1000.0 * mid,
        })
        .collect()
}

/// Zigzag mid prices: down from 100 to 90 over 10 bars, up to 100 over the
/// next 10, and so on. Bottoms sit at indices 10, 30, 50, ...; tops at 20,
/// 40, 60, ...
pub fn zigzag_mids(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let phase = i % 20;
            if phase <= 10 {
                100.0 - phase as f64
            } else {
                90.0 + (phase - 10) as f64
            }
        })
        .collect()
}
