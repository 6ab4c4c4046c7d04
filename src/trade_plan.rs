use serde::{Deserialize, Serialize};

/// Stop distance in ATR multiples.
pub const STOP_ATR_MULTIPLE: f64 = 1.2;
pub const TARGET_1_RISK_MULTIPLE: f64 = 1.0;
pub const TARGET_2_RISK_MULTIPLE: f64 = 2.0;

/// Entry, stop and two targets. Values are unrounded; see [`round_to`] for display.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub entry: f64,
    pub stop: f64,
    pub target_1: f64,
    pub target_2: f64,
}

impl TradePlan {
    /// Plan for a long entry at `entry` sized by `atr`.
    pub fn build(entry: f64, atr: f64) -> Self {
        let stop = entry - STOP_ATR_MULTIPLE * atr;
        let risk = entry - stop;
        Self {
            entry,
            stop,
            target_1: entry + TARGET_1_RISK_MULTIPLE * risk,
            target_2: entry + TARGET_2_RISK_MULTIPLE * risk,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_levels() {
        let plan = TradePlan::build(100.0, 2.0);
        assert_eq!(round_to(plan.entry, 2), 100.0);
        assert_eq!(round_to(plan.stop, 2), 97.6);
        assert_eq!(round_to(plan.target_1, 2), 102.4);
        assert_eq!(round_to(plan.target_2, 2), 104.8);
    }

    #[test]
    fn targets_scale_with_risk() {
        for (entry, atr) in [(12.34, 0.57), (250.0, 7.25), (3.1, 0.01), (41.0, 0.0)] {
            let plan = TradePlan::build(entry, atr);
            let risk = plan.entry - plan.stop;
            assert!((plan.target_1 - plan.entry - risk).abs() < 1e-9);
            assert!((plan.target_2 - plan.entry - 2.0 * risk).abs() < 1e-9);
            assert!((risk - STOP_ATR_MULTIPLE * atr).abs() < 1e-9);
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(1.005_000_1, 2), 1.01);
        assert_eq!(round_to(63.27, 1), 63.3);
        assert_eq!(round_to(-2.345_01, 2), -2.35);
    }
}
