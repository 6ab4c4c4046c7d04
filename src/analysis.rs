//! Per-symbol pipeline: indicators, classification, market filter, trade plan.

use serde::{Deserialize, Serialize};

use crate::bars::BarSeries;
use crate::classifier::{self, Rating, RatingFloor, SignalInput};
use crate::error::SkipReason;
use crate::indicators::{IndicatorSet, SMA_SLOW};
use crate::market_filter::{self, MarketSegment};
use crate::trade_plan::{TradePlan, round_to};

/// Bars required before a symbol is evaluated. Matches the slow trend average.
pub const DEFAULT_MIN_BARS: usize = SMA_SLOW;
/// Smallest configurable minimum: a 20-bar breakout window plus the previous bar.
pub const MIN_BARS_FLOOR: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub min_bars: usize,
    pub rating_floor: RatingFloor,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_bars: DEFAULT_MIN_BARS,
            rating_floor: RatingFloor::default(),
        }
    }
}

fn rounded_2<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}

fn rounded_1<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 1))
}

/// One accepted symbol. Fields hold unrounded values; serialization rounds
/// prices and volume power to 2 decimals and RSI to 1.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub symbol: String,
    pub segment: MarketSegment,
    pub rating: Rating,
    #[serde(serialize_with = "rounded_2")]
    pub entry: f64,
    #[serde(serialize_with = "rounded_2")]
    pub stop: f64,
    #[serde(serialize_with = "rounded_2")]
    pub target_1: f64,
    #[serde(serialize_with = "rounded_2")]
    pub target_2: f64,
    #[serde(serialize_with = "rounded_1")]
    pub rsi: f64,
    #[serde(serialize_with = "rounded_2")]
    pub volume_power: f64,
}

/// Runs one series through the pipeline. Every early return is a skip.
pub fn evaluate_series(
    series: &BarSeries,
    segment: MarketSegment,
    config: &AnalysisConfig,
) -> Result<CandidateResult, SkipReason> {
    let need = config.min_bars.max(MIN_BARS_FLOOR);
    if series.len() < need {
        return Err(SkipReason::InsufficientData {
            have: series.len(),
            need,
        });
    }
    let (last, prev) = series.last_two().ok_or(SkipReason::InsufficientData {
        have: series.len(),
        need,
    })?;

    let indicators = IndicatorSet::compute(series.bars())
        .map_err(|e| SkipReason::Degenerate(e.to_string()))?;
    // With a relaxed minimum the slow average may still be warming up.
    let snapshot = indicators.latest().ok_or(SkipReason::InsufficientData {
        have: series.len(),
        need: SMA_SLOW,
    })?;
    let input = SignalInput::from_snapshot(last.close, last.volume, &snapshot)
        .ok_or_else(|| SkipReason::Degenerate("average volume is zero".to_string()))?;

    let rating = classifier::classify(&input).map_err(SkipReason::ConditionsNotMet)?;
    market_filter::check(segment, last, prev)?;
    if !config.rating_floor.admits(rating) {
        return Err(SkipReason::BelowRatingFloor(rating));
    }

    let plan = TradePlan::build(last.close, snapshot.atr);
    Ok(CandidateResult {
        symbol: series.symbol().to_string(),
        segment,
        rating,
        entry: plan.entry,
        stop: plan.stop,
        target_1: plan.target_1,
        target_2: plan.target_2,
        rsi: input.rsi,
        volume_power: input.volume_ratio,
    })
}
