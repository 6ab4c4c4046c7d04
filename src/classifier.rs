//! Signal classifier: the four entry conditions and the star rating.

use crate::indicators::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const RSI_BAND_LOW: f64 = 55.0;
pub const RSI_BAND_HIGH: f64 = 68.0;
pub const MIN_VOLUME_RATIO: f64 = 1.3;

pub const FOUR_STAR_VOLUME_RATIO: f64 = 2.0;
pub const FOUR_STAR_RSI_LOW: f64 = 58.0;
pub const FOUR_STAR_RSI_HIGH: f64 = 65.0;
pub const THREE_STAR_VOLUME_RATIO: f64 = 1.5;

/// Ordinal candidate quality. Ordering follows the star count.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    TwoStar,
    ThreeStar,
    FourStar,
}

impl Rating {
    pub fn stars(&self) -> usize {
        match self {
            Rating::TwoStar => 2,
            Rating::ThreeStar => 3,
            Rating::FourStar => 4,
        }
    }

    pub fn label(&self) -> String {
        "⭐".repeat(self.stars())
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-star", self.stars())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "two_star" | "2-star" => Ok(Rating::TwoStar),
            "3" | "three_star" | "3-star" => Ok(Rating::ThreeStar),
            "4" | "four_star" | "4-star" => Ok(Rating::FourStar),
            other => Err(format!("unknown rating '{}'", other)),
        }
    }
}

/// One of the four entry conditions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    StrongTrend,
    Breakout,
    Momentum,
    Volume,
}

/// What the classifier looks at on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInput {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_mid: f64,
    pub sma_slow: f64,
    pub breakout_high: f64,
    pub rsi: f64,
    pub volume_ratio: f64,
}

impl SignalInput {
    /// Combines the latest bar with its indicator values. `None` when the
    /// average volume is not positive, which leaves the volume ratio undefined.
    pub fn from_snapshot(close: f64, volume: f64, snapshot: &IndicatorSnapshot) -> Option<Self> {
        if !(snapshot.volume_avg > 0.0) {
            return None;
        }
        Some(Self {
            close,
            sma_fast: snapshot.sma_fast,
            sma_mid: snapshot.sma_mid,
            sma_slow: snapshot.sma_slow,
            breakout_high: snapshot.breakout_high,
            rsi: snapshot.rsi,
            volume_ratio: volume / snapshot.volume_avg,
        })
    }

    pub fn strong_trend(&self) -> bool {
        self.close > self.sma_fast && self.sma_fast > self.sma_mid && self.sma_mid > self.sma_slow
    }

    pub fn breakout(&self) -> bool {
        self.close >= self.breakout_high
    }

    pub fn momentum(&self) -> bool {
        self.rsi > RSI_BAND_LOW && self.rsi < RSI_BAND_HIGH
    }

    pub fn volume_confirmed(&self) -> bool {
        self.volume_ratio > MIN_VOLUME_RATIO
    }

    /// Conditions that do not hold, in a fixed order.
    pub fn failed_conditions(&self) -> Vec<Condition> {
        [
            (Condition::StrongTrend, self.strong_trend()),
            (Condition::Breakout, self.breakout()),
            (Condition::Momentum, self.momentum()),
            (Condition::Volume, self.volume_confirmed()),
        ]
        .into_iter()
        .filter_map(|(condition, held)| (!held).then_some(condition))
        .collect()
    }
}

/// Star rating for a candidate that already passed all four conditions.
pub fn rate(volume_ratio: f64, rsi: f64) -> Rating {
    if volume_ratio >= FOUR_STAR_VOLUME_RATIO && (FOUR_STAR_RSI_LOW..=FOUR_STAR_RSI_HIGH).contains(&rsi) {
        Rating::FourStar
    } else if volume_ratio >= THREE_STAR_VOLUME_RATIO {
        Rating::ThreeStar
    } else {
        Rating::TwoStar
    }
}

/// Gate plus rating. `Err` carries every failed condition.
pub fn classify(input: &SignalInput) -> Result<Rating, Vec<Condition>> {
    let failed = input.failed_conditions();
    if !failed.is_empty() {
        return Err(failed);
    }
    Ok(rate(input.volume_ratio, input.rsi))
}

/// Lowest rating kept in the result table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingFloor(pub Rating);

impl Default for RatingFloor {
    fn default() -> Self {
        RatingFloor(Rating::ThreeStar)
    }
}

impl RatingFloor {
    pub fn admits(&self, rating: Rating) -> bool {
        rating >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing() -> SignalInput {
        SignalInput {
            close: 100.0,
            sma_fast: 98.0,
            sma_mid: 95.0,
            sma_slow: 90.0,
            breakout_high: 99.0,
            rsi: 60.0,
            volume_ratio: 3.0,
        }
    }

    #[test]
    fn reference_fixture_is_four_star() {
        assert_eq!(classify(&passing()), Ok(Rating::FourStar));
    }

    #[test]
    fn removing_any_condition_rejects() {
        let mut no_trend = passing();
        no_trend.sma_mid = 99.0;
        assert_eq!(classify(&no_trend), Err(vec![Condition::StrongTrend]));

        let mut no_breakout = passing();
        no_breakout.breakout_high = 100.5;
        assert_eq!(classify(&no_breakout), Err(vec![Condition::Breakout]));

        let mut no_momentum = passing();
        no_momentum.rsi = 70.0;
        assert_eq!(classify(&no_momentum), Err(vec![Condition::Momentum]));

        let mut no_volume = passing();
        no_volume.volume_ratio = 1.2;
        assert_eq!(classify(&no_volume), Err(vec![Condition::Volume]));
    }

    #[test]
    fn trend_ordering_is_strict() {
        let mut flat = passing();
        flat.sma_fast = flat.close;
        assert!(!flat.strong_trend());
    }

    #[test]
    fn breakout_accepts_matching_the_high() {
        let mut matched = passing();
        matched.breakout_high = matched.close;
        assert!(matched.breakout());
    }

    #[test]
    fn momentum_band_excludes_both_edges() {
        let mut input = passing();
        input.rsi = 55.0;
        assert!(!input.momentum());
        input.rsi = 68.0;
        assert!(!input.momentum());
        input.rsi = 55.01;
        assert!(input.momentum());
    }

    #[test]
    fn volume_ratio_must_exceed_threshold() {
        let mut input = passing();
        input.volume_ratio = MIN_VOLUME_RATIO;
        assert!(!input.volume_confirmed());
    }

    #[test]
    fn failures_are_all_reported() {
        let input = SignalInput {
            close: 50.0,
            sma_fast: 60.0,
            sma_mid: 70.0,
            sma_slow: 80.0,
            breakout_high: 90.0,
            rsi: 30.0,
            volume_ratio: 0.5,
        };
        assert_eq!(
            classify(&input),
            Err(vec![
                Condition::StrongTrend,
                Condition::Breakout,
                Condition::Momentum,
                Condition::Volume
            ])
        );
    }

    #[test]
    fn rating_precedence() {
        assert_eq!(rate(2.2, 60.0), Rating::FourStar);
        assert_eq!(rate(2.0, 58.0), Rating::FourStar);
        assert_eq!(rate(2.0, 65.0), Rating::FourStar);
        // Heavy volume but RSI outside the four-star window falls to three.
        assert_eq!(rate(2.5, 66.0), Rating::ThreeStar);
        assert_eq!(rate(1.5, 60.0), Rating::ThreeStar);
        assert_eq!(rate(1.49, 60.0), Rating::TwoStar);
    }

    #[test]
    fn default_floor_discards_two_star() {
        let floor = RatingFloor::default();
        assert!(!floor.admits(Rating::TwoStar));
        assert!(floor.admits(Rating::ThreeStar));
        assert!(floor.admits(Rating::FourStar));
        assert!(RatingFloor(Rating::TwoStar).admits(Rating::TwoStar));
    }

    #[test]
    fn zero_average_volume_has_no_input() {
        let snapshot = IndicatorSnapshot {
            sma_fast: 1.0,
            sma_mid: 1.0,
            sma_slow: 1.0,
            rsi: 50.0,
            volume_avg: 0.0,
            atr: 1.0,
            breakout_high: 1.0,
        };
        assert!(SignalInput::from_snapshot(1.0, 10.0, &snapshot).is_none());
    }

    #[test]
    fn rating_parses_and_orders() {
        assert_eq!("4".parse::<Rating>().unwrap(), Rating::FourStar);
        assert_eq!("three_star".parse::<Rating>().unwrap(), Rating::ThreeStar);
        assert!(Rating::FourStar > Rating::ThreeStar);
        assert_eq!(Rating::ThreeStar.label(), "⭐⭐⭐");
    }
}
