//! Inclusion removal: turning raw bars into inclusion-free merged bars.
//!
//! Two bars "contain" each other when one's high/low range covers the
//! other's. Contained bars are merged in the direction of the preceding pair:
//! upward keeps the higher high and higher low, downward the lower of both.

use crate::domain::{Bar, BarId, Direction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bar with no inclusion relationship to its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedBar {
    pub id: BarId,
    pub dt: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vol: f64,
    pub amount: f64,
    /// Raw bars merged into this one, in time order.
    pub elements: Vec<Bar>,
}

impl MergedBar {
    pub fn from_raw(bar: &Bar) -> Self {
        Self {
            id: bar.id,
            dt: bar.dt,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            vol: bar.vol,
            amount: bar.amount,
            elements: vec![bar.clone()],
        }
    }

    pub fn raw_bars(&self) -> &[Bar] {
        &self.elements
    }
}

fn contains(a_high: f64, a_low: f64, b_high: f64, b_low: f64) -> bool {
    (a_high <= b_high && a_low >= b_low) || (a_high >= b_high && a_low <= b_low)
}

/// Fold raw bar `k3` onto the inclusion-free pair `(k1, k2)`.
///
/// Returns `(true, merged)` when `k3` was merged into `k2` (the caller replaces
/// `k2`), or `(false, new)` when `k3` starts a new merged bar. Equal highs on
/// `k1`/`k2` give no direction, so `k3` is never merged in that case.
pub fn remove_include(k1: &MergedBar, k2: &MergedBar, k3: &Bar) -> (bool, MergedBar) {
    let direction = if k1.high < k2.high {
        Direction::Up
    } else if k1.high > k2.high {
        Direction::Down
    } else {
        return (false, MergedBar::from_raw(k3));
    };

    if !contains(k2.high, k2.low, k3.high, k3.low) {
        return (false, MergedBar::from_raw(k3));
    }

    let (high, low, dt) = match direction {
        Direction::Up => {
            let dt = if k2.high > k3.high { k2.dt } else { k3.dt };
            (k2.high.max(k3.high), k2.low.max(k3.low), dt)
        }
        Direction::Down => {
            let dt = if k2.low < k3.low { k2.dt } else { k3.dt };
            (k2.high.min(k3.high), k2.low.min(k3.low), dt)
        }
    };
    let (open, close) = if k3.open > k3.close {
        (high, low)
    } else {
        (low, high)
    };

    let mut elements: Vec<Bar> = k2
        .elements
        .iter()
        .filter(|x| x.dt != k3.dt)
        .cloned()
        .collect();
    elements.push(k3.clone());

    let merged = MergedBar {
        id: k2.id,
        dt,
        open,
        high,
        low,
        close,
        vol: k2.vol + k3.vol,
        amount: k2.amount + k3.amount,
        elements,
    };
    (true, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bars_from_mids;

    fn with_range(mut bar: Bar, high: f64, low: f64) -> Bar {
        bar.high = high;
        bar.low = low;
        bar
    }

    #[test]
    fn no_inclusion_starts_new_bar() {
        let bars = bars_from_mids(&[10.0, 11.0, 12.0]);
        let k1 = MergedBar::from_raw(&bars[0]);
        let k2 = MergedBar::from_raw(&bars[1]);
        let (merged, k3) = remove_include(&k1, &k2, &bars[2]);
        assert!(!merged);
        assert_eq!(k3.elements.len(), 1);
        assert_eq!(k3.high, 12.5);
    }

    #[test]
    fn upward_inclusion_keeps_higher_range() {
        let bars = bars_from_mids(&[10.0, 11.0, 11.0]);
        let k1 = MergedBar::from_raw(&bars[0]);
        let k2 = MergedBar::from_raw(&with_range(bars[1].clone(), 12.0, 10.0));
        let k3 = with_range(bars[2].clone(), 11.5, 10.5);
        let (merged, out) = remove_include(&k1, &k2, &k3);
        assert!(merged);
        assert_eq!(out.high, 12.0);
        assert_eq!(out.low, 10.5);
        assert_eq!(out.dt, k2.dt);
        assert_eq!(out.id, k2.id);
        assert_eq!(out.elements.len(), 2);
        assert_eq!(out.vol, 2000.0);
    }

    #[test]
    fn downward_inclusion_keeps_lower_range() {
        let bars = bars_from_mids(&[12.0, 11.0, 11.0]);
        let k1 = MergedBar::from_raw(&bars[0]);
        let k2 = MergedBar::from_raw(&with_range(bars[1].clone(), 11.5, 10.5));
        let k3 = with_range(bars[2].clone(), 12.0, 10.0);
        let (merged, out) = remove_include(&k1, &k2, &k3);
        assert!(merged);
        assert_eq!(out.high, 11.5);
        assert_eq!(out.low, 10.0);
        assert_eq!(out.dt, k3.dt);
    }

    #[test]
    fn equal_highs_never_merge() {
        let bars = bars_from_mids(&[10.0, 10.0, 10.0]);
        let k1 = MergedBar::from_raw(&bars[0]);
        let k2 = MergedBar::from_raw(&bars[1]);
        let (merged, _) = remove_include(&k1, &k2, &bars[2]);
        assert!(!merged);
    }

    #[test]
    fn replacement_bar_is_not_duplicated() {
        let bars = bars_from_mids(&[10.0, 11.0, 11.0]);
        let k1 = MergedBar::from_raw(&bars[0]);
        let k2 = MergedBar::from_raw(&with_range(bars[1].clone(), 12.0, 10.0));
        // Same timestamp as k2's only element: an intra-period update.
        let mut update = with_range(bars[1].clone(), 11.8, 10.2);
        update.id = BarId(99);
        let (merged, out) = remove_include(&k1, &k2, &update);
        assert!(merged);
        assert_eq!(out.elements.len(), 1);
        assert_eq!(out.elements[0].id, BarId(99));
    }
}
