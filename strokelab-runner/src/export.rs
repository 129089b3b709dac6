//! Export replay results and bars as CSV and JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use strokelab_core::domain::Bar;

use crate::replay::{ReplayReport, SignalEvent};

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Signal events as CSV.
///
/// Columns: symbol, dt, period, freq, key, value, signal, close,
/// forward_return, hit
pub fn events_to_csv(events: &[SignalEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "dt",
        "period",
        "freq",
        "key",
        "value",
        "signal",
        "close",
        "forward_return",
        "hit",
    ])?;

    for e in events {
        wtr.write_record([
            &e.symbol,
            &e.dt.to_string(),
            &e.period.to_string(),
            e.freq.label(),
            &e.key,
            e.value.label(),
            &e.signal,
            &format!("{:.6}", e.close),
            &opt_f64(e.forward_return),
            &e.hit.map(|h| h.to_string()).unwrap_or_default(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Bars as CSV: dt, symbol, freq, open, high, low, close, vol, amount.
pub fn bars_to_csv(bars: &[Bar]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "dt", "symbol", "freq", "open", "high", "low", "close", "vol", "amount",
    ])?;
    for b in bars {
        wtr.write_record([
            &b.dt.to_string(),
            &b.symbol,
            b.freq.label(),
            &format!("{:.4}", b.open),
            &format!("{:.4}", b.high),
            &format!("{:.4}", b.low),
            &format!("{:.4}", b.close),
            &format!("{:.2}", b.vol),
            &format!("{:.2}", b.amount),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write the events of every report into one CSV file.
pub fn write_events_csv(reports: &[ReplayReport], path: &Path) -> Result<()> {
    let events: Vec<SignalEvent> = reports
        .iter()
        .flat_map(|r| r.events.iter().cloned())
        .collect();
    let csv = events_to_csv(&events)?;
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON.
pub fn report_to_json(report: &ReplayReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ReplayReport to JSON")
}

/// Write reports as a pretty JSON array.
pub fn write_reports_json(reports: &[ReplayReport], path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(reports).context("failed to serialize reports to JSON")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use strokelab_core::domain::{BarId, Freq};
    use strokelab_core::signal::SignalValue;

    fn dt(h: u32, m: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 12)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(value: SignalValue, hit: Option<bool>) -> SignalEvent {
        SignalEvent {
            symbol: "600000.SH".into(),
            dt: dt(10, 5),
            period: dt(10, 30),
            freq: Freq::F30,
            signal: format!("30m_DIFNearZeroT50_BSAuxV240612_{value}_any_any_0"),
            key: "30m_DIFNearZeroT50_BSAuxV240612".into(),
            value,
            close: 10.5,
            forward_return: hit.map(|h| if h { 0.02 } else { -0.01 }),
            hit,
            period_index: 3,
        }
    }

    fn report() -> ReplayReport {
        ReplayReport {
            symbol: "600000.SH".into(),
            base_freq: Freq::F5,
            bars: 1000,
            start: Some(dt(9, 35)),
            end: Some(dt(15, 0)),
            horizon: 5,
            counts: BTreeMap::new(),
            hits: BTreeMap::new(),
            events: vec![event(SignalValue::BuyPoint, Some(true)), event(SignalValue::SellPoint, None)],
        }
    }

    #[test]
    fn events_csv_has_header_and_rows() {
        let csv = events_to_csv(&report().events).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol,dt,period,freq,key,value"));
        assert!(lines[1].contains("buy point"));
        assert!(lines[1].ends_with("0.020000,true"));
        assert!(lines[2].ends_with(",,"));
    }

    #[test]
    fn bars_csv_rows() {
        let bar = Bar {
            id: BarId(0),
            symbol: "X".into(),
            freq: Freq::D,
            dt: dt(0, 0),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            vol: 100.0,
            amount: 150.0,
        };
        let csv = bars_to_csv(&[bar]).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("X,D,1.0000,2.0000,0.5000,1.5000,100.00,150.00"));
    }

    #[test]
    fn report_json_roundtrip() {
        let r = report();
        let json = report_to_json(&r).unwrap();
        assert!(json.contains("\"buy point\""));
        let back: ReplayReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.events.len(), 2);
        assert_eq!(back.events[0].value, SignalValue::BuyPoint);
        assert_eq!(back.symbol, r.symbol);
    }

    #[test]
    fn writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("events.csv");
        let json_path = dir.path().join("reports.json");
        write_events_csv(&[report(), report()], &csv_path).unwrap();
        write_reports_json(&[report()], &json_path).unwrap();
        assert_eq!(fs::read_to_string(&csv_path).unwrap().lines().count(), 5);
        let parsed: Vec<ReplayReport> =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
