//! Synthetic bars for offline runs.
//!
//! A seeded random walk with a slow cycle on top, so the segmenter finds
//! strokes. The seed is derived from the symbol name, so the same symbol
//! always produces the same series.

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strokelab_core::domain::{Bar, BarId, Freq};

fn step(freq: Freq) -> Duration {
    match freq.minutes() {
        Some(m) => Duration::minutes(m as i64),
        None => match freq {
            Freq::Tick => Duration::seconds(3),
            Freq::W => Duration::days(7),
            Freq::M => Duration::days(30),
            Freq::S => Duration::days(91),
            Freq::Y => Duration::days(365),
            _ => Duration::days(1),
        },
    }
}

fn is_weekend(dt: NaiveDateTime) -> bool {
    matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Generate `n` bars for `symbol` starting at `start`, skipping weekends.
pub fn generate_bars(symbol: &str, freq: Freq, start: NaiveDateTime, n: usize) -> Vec<Bar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let period = rng.gen_range(40.0..90.0_f64);

    let mut bars = Vec::with_capacity(n);
    let mut dt = start;
    let mut price = 100.0_f64;
    for i in 0..n {
        while is_weekend(dt) {
            dt += Duration::days(1);
        }
        let cycle = 0.004 * (2.0 * std::f64::consts::PI * i as f64 / period).cos();
        let ret = cycle + rng.gen_range(-0.006..0.006);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.003));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.003));
        let vol = rng.gen_range(1_000.0..50_000.0_f64).round();
        bars.push(Bar {
            id: BarId(i as u64),
            symbol: symbol.to_string(),
            freq,
            dt,
            open,
            high,
            low,
            close,
            vol,
            amount: vol * (open + close) / 2.0,
        });
        price = close;
        dt += step(freq);
    }
    bars
}
