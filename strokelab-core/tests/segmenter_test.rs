//! Integration tests for the incremental stroke analyzer.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use strokelab_core::analyze::{SegmenterConfig, StrokeAnalyzer};
use strokelab_core::domain::{Bar, BarId, Direction, Freq};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_dt() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn bar(i: usize, mid: f64) -> Bar {
    Bar {
        id: BarId(0),
        symbol: "000001.SH".into(),
        freq: Freq::F30,
        dt: base_dt() + Duration::minutes(30 * i as i64),
        open: mid,
        high: mid + 0.5,
        low: mid - 0.5,
        close: mid,
        vol: 500.0,
        amount: 500.0 * mid,
    }
}

/// Zigzag with a 20-bar period: bottoms at 10, 30, ...; tops at 20, 40, ...
fn zigzag(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let phase = i % 20;
            let mid = if phase <= 10 {
                100.0 - phase as f64
            } else {
                90.0 + (phase - 10) as f64
            };
            bar(i, mid)
        })
        .collect()
}

/// Sine wave with a slowly rising trend.
fn wave(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            bar(i, 100.0 + 0.02 * x + 8.0 * (x / 6.0).sin())
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn strokes_alternate_and_share_endpoints() {
    let a = StrokeAnalyzer::from_bars(&wave(600), SegmenterConfig::default()).unwrap();
    assert!(a.strokes().len() > 10, "got {} strokes", a.strokes().len());
    for w in a.strokes().windows(2) {
        assert_ne!(w[0].direction, w[1].direction);
        assert_eq!(w[0].fx_b.dt, w[1].fx_a.dt);
    }
}

#[test]
fn stroke_raw_bars_run_between_extremes() {
    let a = StrokeAnalyzer::from_bars(&zigzag(195), SegmenterConfig::default()).unwrap();
    for bi in a.strokes() {
        let raw = bi.raw_bars();
        assert_eq!(raw.first().unwrap().dt, bi.sdt());
        assert_eq!(raw.last().unwrap().dt, bi.edt());
        for w in raw.windows(2) {
            assert!(w[0].dt < w[1].dt);
        }
        match bi.direction {
            Direction::Up => assert!(bi.fx_b.value > bi.fx_a.value),
            Direction::Down => assert!(bi.fx_b.value < bi.fx_a.value),
        }
    }
}

#[test]
fn unconfirmed_buffer_follows_last_stroke() {
    let a = StrokeAnalyzer::from_bars(&zigzag(195), SegmenterConfig::default()).unwrap();
    let last = a.last_stroke().unwrap();
    let first_unconfirmed = a.unconfirmed().first().unwrap();
    assert_eq!(first_unconfirmed.dt, last.fx_b.first_dt());
}

#[test]
fn incremental_feed_matches_batch() {
    let bars = wave(300);
    let batch = StrokeAnalyzer::from_bars(&bars, SegmenterConfig::default()).unwrap();

    let mut inc = StrokeAnalyzer::new("000001.SH", Freq::F30, SegmenterConfig::default()).unwrap();
    for b in &bars {
        inc.update(b.clone()).unwrap();
    }
    assert_eq!(inc.strokes(), batch.strokes());
    assert_eq!(inc.unconfirmed(), batch.unconfirmed());
    assert_eq!(inc.raw_bars(), batch.raw_bars());
}

#[test]
fn window_keeps_last_strokes_only() {
    let cfg = SegmenterConfig {
        max_bi_num: 8,
        ..SegmenterConfig::default()
    };
    let a = StrokeAnalyzer::from_bars(&wave(800), cfg).unwrap();
    assert_eq!(a.strokes().len(), 8);
    assert_eq!(a.raw_bars()[0].dt, a.strokes()[0].fx_a.first_dt());
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = SegmenterConfig {
        max_bi_num: 0,
        ..SegmenterConfig::default()
    };
    assert!(StrokeAnalyzer::new("X", Freq::D, cfg).is_err());
}

#[test]
fn config_from_partial_json_uses_defaults() {
    let cfg: SegmenterConfig = serde_json::from_str(r#"{"min_bi_len": 7}"#).unwrap();
    assert_eq!(cfg.min_bi_len, 7);
    assert_eq!(cfg.max_bi_num, 50);
    assert!(!cfg.change_threshold_enabled());
}
