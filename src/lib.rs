//! Swing-trade market scanner.
//!
//! Fetches recent OHLCV history per symbol, computes trend/momentum/volume
//! indicators, keeps the symbols that pass a four-condition breakout gate and
//! the market's liquidity guards, and turns them into ranked trade plans
//! (entry, stop, two targets).
//!
//! ```ignore
//! use swing_scanner::{Scanner, ScanRequest, ScanConfig, MarketSegment, Interval};
//! use swing_scanner::yahoo::YahooBarSource;
//!
//! let scanner = Scanner::new(YahooBarSource::new(120)?, ScanConfig::default());
//! let report = scanner
//!     .scan(&ScanRequest {
//!         symbols: vec!["AAPL".into(), "NVDA".into()],
//!         segment: MarketSegment::Unrestricted,
//!         lookback: ScanConfig::default().lookback(),
//!         interval: Interval::Day1,
//!     })
//!     .await?;
//! ```

pub mod analysis;
pub mod bar_source;
pub mod bars;
pub mod classifier;
pub mod comfy_table;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod market_filter;
pub mod ranking;
pub mod scanner;
pub mod storage_utils;
pub mod trade_plan;
pub mod yahoo;

#[cfg(test)]
mod test_support;

pub use analysis::{AnalysisConfig, CandidateResult, evaluate_series};
pub use bar_source::{BarSource, BarSourceError, CachedBarSource};
pub use bars::{Bar, BarSeries, Interval};
pub use classifier::{Condition, Rating, RatingFloor};
pub use error::{ScanError, SkipKind, SkipReason};
pub use market_filter::MarketSegment;
pub use ranking::ResultFilter;
pub use scanner::{ScanProgress, ScanReport, ScanRequest, Scanner, scan};
pub use storage_utils::{AppConfig, ScanConfig};
pub use trade_plan::TradePlan;
