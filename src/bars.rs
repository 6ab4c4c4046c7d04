//! OHLCV bars and the per-symbol series the scanner works on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Bar spacing requested from a [`BarSource`](crate::bar_source::BarSource).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1wk")]
    Week1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
        }
    }

    pub fn duration(&self) -> Duration {
        let secs = match self {
            Interval::Minute1 => 60,
            Interval::Minute5 => 5 * 60,
            Interval::Minute15 => 15 * 60,
            Interval::Minute30 => 30 * 60,
            Interval::Hour1 => 60 * 60,
            Interval::Day1 => 24 * 60 * 60,
            Interval::Week1 => 7 * 24 * 60 * 60,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "30m" => Ok(Interval::Minute30),
            "1h" | "60m" => Ok(Interval::Hour1),
            "1d" => Ok(Interval::Day1),
            "1wk" => Ok(Interval::Week1),
            other => Err(format!("unsupported interval '{}'", other)),
        }
    }
}

/// One trading period summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// Lets `ta` indicators consume bars directly (true range, rolling maximum).
impl ta::Open for Bar {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Bar {
    fn volume(&self) -> f64 {
        self.volume
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("bar {index} is not after the previous bar")]
    NonIncreasingTimestamp { index: usize },
    #[error("bar {index} has a non-finite or negative {field}")]
    InvalidValue { index: usize, field: &'static str },
}

/// Time-ordered bars for one symbol. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Builds a series, rejecting out-of-order timestamps and unusable prices.
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            let fields = [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
                ("volume", bar.volume),
            ];
            if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
                return Err(SeriesError::InvalidValue { index, field });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::NonIncreasingTimestamp { index });
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Latest and previous bar, when the series has at least two.
    pub fn last_two(&self) -> Option<(&Bar, &Bar)> {
        match self.bars.as_slice() {
            [.., prev, last] => Some((last, prev)),
            _ => None,
        }
    }
}
