//! Synthetic bar series shared by unit tests.

use crate::bars::{Bar, BarSeries, Interval};
use chrono::{Duration, TimeZone, Utc};

fn day(i: usize) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap() + Duration::days(i as i64)
}

/// Bars with a +/-1.0 wick around each close and flat volume.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: day(i),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        })
        .collect()
}

/// Closes rising by 1.0 per bar from 100.
pub fn rising_bars(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    bars_from_closes(&closes)
}

/// A zig-zag uptrend (+1.6 / -1.0) ending on an up bar that closes at its
/// high. With `n >= 200` it passes the trend, breakout and momentum checks
/// (RSI settles near 63); the last bar trades `last_volume_multiple` times
/// `base_volume`.
pub fn qualifying_bars(n: usize, base_volume: f64, last_volume_multiple: f64) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(n);
    let mut prev_close = 100.0;
    for i in 0..n {
        let up = (n - 1 - i) % 2 == 0;
        let close = if i == 0 {
            prev_close
        } else if up {
            prev_close + 1.6
        } else {
            prev_close - 1.0
        };
        bars.push(Bar {
            timestamp: day(i),
            open: prev_close,
            high: close.max(prev_close),
            low: close.min(prev_close),
            close,
            volume: base_volume,
        });
        prev_close = close;
    }
    if let Some(last) = bars.last_mut() {
        last.volume = base_volume * last_volume_multiple;
    }
    bars
}

pub fn series(symbol: &str, bars: Vec<Bar>) -> BarSeries {
    BarSeries::new(symbol, Interval::Day1, bars).unwrap()
}
