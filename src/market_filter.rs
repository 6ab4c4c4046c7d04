use crate::bars::Bar;
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum `close * volume` on the latest bar for liquidity-sensitive markets.
pub const MIN_TRADED_VALUE: f64 = 10_000_000.0;
/// Largest absolute close-to-close move (percent) tolerated on the latest bar.
pub const MAX_DAILY_CHANGE_PCT: f64 = 8.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    /// Thin regional exchanges: traded-value floor and single-day move cap apply.
    LiquiditySensitive,
    Unrestricted,
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketSegment::LiquiditySensitive => f.write_str("liquidity_sensitive"),
            MarketSegment::Unrestricted => f.write_str("unrestricted"),
        }
    }
}

impl FromStr for MarketSegment {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "liquidity_sensitive" => Ok(MarketSegment::LiquiditySensitive),
            "unrestricted" => Ok(MarketSegment::Unrestricted),
            _ => Err(ScanError::UnknownSegment(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterRejection {
    #[error("traded value {traded_value:.0} below floor {floor:.0}")]
    ThinTrading { traded_value: f64, floor: f64 },
    #[error("daily move {change_pct:.2}% exceeds {limit:.2}%")]
    ExcessiveMove { change_pct: f64, limit: f64 },
    #[error("previous close is zero, daily move undefined")]
    UndefinedMove,
}

/// Absolute close-to-close change in percent. `None` when `prev_close` is zero.
pub fn daily_change_pct(prev_close: f64, close: f64) -> Option<f64> {
    if prev_close == 0.0 {
        return None;
    }
    Some(((close - prev_close) / prev_close).abs() * 100.0)
}

/// Segment-specific guards on the latest bar, applied after classification.
pub fn check(segment: MarketSegment, last: &Bar, prev: &Bar) -> Result<(), FilterRejection> {
    match segment {
        MarketSegment::Unrestricted => Ok(()),
        MarketSegment::LiquiditySensitive => {
            let traded_value = last.close * last.volume;
            if traded_value < MIN_TRADED_VALUE {
                return Err(FilterRejection::ThinTrading {
                    traded_value,
                    floor: MIN_TRADED_VALUE,
                });
            }

            let change_pct =
                daily_change_pct(prev.close, last.close).ok_or(FilterRejection::UndefinedMove)?;
            if change_pct > MAX_DAILY_CHANGE_PCT {
                return Err(FilterRejection::ExcessiveMove {
                    change_pct,
                    limit: MAX_DAILY_CHANGE_PCT,
                });
            }
            Ok(())
        }
    }
}
