use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::bar_source::BarSourceError;
use crate::bars::SeriesError;
use crate::classifier::{Condition, Rating};
use crate::market_filter::FilterRejection;

/// Scan-wide configuration problems. Reported before any symbol is fetched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("symbol list is empty")]
    EmptySymbolList,
    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),
    #[error("unknown market segment '{0}'")]
    UnknownSegment(String),
    #[error("unknown market '{0}'")]
    UnknownMarket(String),
    #[error("lookback of {lookback:?} cannot hold {min_bars} bars of {interval}")]
    InvalidWindow {
        lookback: Duration,
        interval: String,
        min_bars: usize,
    },
    #[error("min_bars {got} is out of range (minimum {floor})")]
    InvalidMinBars { got: usize, floor: usize },
    #[error("max_concurrency must be greater than zero")]
    InvalidConcurrency,
    #[error("scan timeout must be greater than zero")]
    InvalidTimeout,
}

/// Why a symbol produced no result row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("insufficient data: {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),
    #[error("provider failure: {0}")]
    Provider(#[from] BarSourceError),
    #[error("degenerate input: {0}")]
    Degenerate(String),
    #[error("conditions not met: {0:?}")]
    ConditionsNotMet(Vec<Condition>),
    #[error("market filter: {0}")]
    MarketFilter(#[from] FilterRejection),
    #[error("rating {0} below the retained floor")]
    BelowRatingFloor(Rating),
    #[error("scan deadline reached before the symbol finished")]
    TimedOut,
    #[error("scan cancelled before the symbol finished")]
    Cancelled,
}

/// Coarse skip category, kept in reports and counted in scan summaries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    InsufficientData,
    Provider,
    Degenerate,
    NotQualified,
    MarketFilter,
    BelowRatingFloor,
    TimedOut,
    Cancelled,
}

impl SkipReason {
    pub fn kind(&self) -> SkipKind {
        match self {
            SkipReason::InsufficientData { .. } | SkipReason::InvalidSeries(_) => {
                SkipKind::InsufficientData
            }
            SkipReason::Provider(_) => SkipKind::Provider,
            SkipReason::Degenerate(_) => SkipKind::Degenerate,
            SkipReason::ConditionsNotMet(_) => SkipKind::NotQualified,
            SkipReason::MarketFilter(_) => SkipKind::MarketFilter,
            SkipReason::BelowRatingFloor(_) => SkipKind::BelowRatingFloor,
            SkipReason::TimedOut => SkipKind::TimedOut,
            SkipReason::Cancelled => SkipKind::Cancelled,
        }
    }
}
