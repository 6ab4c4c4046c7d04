use std::cmp::Ordering;

use crate::analysis::CandidateResult;
use crate::classifier::Rating;
use crate::market_filter::MarketSegment;

/// Rating descending, then volume power descending. Ties keep no particular order.
pub fn compare(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    b.rating
        .cmp(&a.rating)
        .then_with(|| b.volume_power.total_cmp(&a.volume_power))
}

pub fn rank(results: &mut [CandidateResult]) {
    results.sort_unstable_by(compare);
}

/// Narrows a ranked table for display without changing its order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResultFilter {
    pub segment: Option<MarketSegment>,
    /// Exact rating to show; `None` shows every retained rating.
    pub rating: Option<Rating>,
}

impl ResultFilter {
    pub fn matches(&self, result: &CandidateResult) -> bool {
        self.segment.is_none_or(|s| s == result.segment)
            && self.rating.is_none_or(|r| r == result.rating)
    }

    pub fn apply<'a>(&self, results: &'a [CandidateResult]) -> Vec<&'a CandidateResult> {
        results.iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, rating: Rating, volume_power: f64, segment: MarketSegment) -> CandidateResult {
        CandidateResult {
            symbol: symbol.to_string(),
            segment,
            rating,
            entry: 10.0,
            stop: 9.0,
            target_1: 11.0,
            target_2: 12.0,
            rsi: 60.0,
            volume_power,
        }
    }

    fn symbols(rows: &[CandidateResult]) -> Vec<&str> {
        rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn rating_first_then_volume_power() {
        let mut rows = vec![
            row("C", Rating::ThreeStar, 5.0, MarketSegment::Unrestricted),
            row("B", Rating::FourStar, 1.8, MarketSegment::Unrestricted),
            row("A", Rating::FourStar, 3.0, MarketSegment::Unrestricted),
        ];
        rank(&mut rows);
        assert_eq!(symbols(&rows), vec!["A", "B", "C"]);
    }

    #[test]
    fn nan_volume_power_does_not_panic() {
        let mut rows = vec![
            row("A", Rating::ThreeStar, f64::NAN, MarketSegment::Unrestricted),
            row("B", Rating::FourStar, 1.0, MarketSegment::Unrestricted),
        ];
        rank(&mut rows);
        assert_eq!(rows[0].symbol, "B");
    }

    #[test]
    fn filter_keeps_rank_order() {
        let mut rows = vec![
            row("SA1", Rating::FourStar, 2.5, MarketSegment::LiquiditySensitive),
            row("US1", Rating::FourStar, 3.5, MarketSegment::Unrestricted),
            row("SA2", Rating::ThreeStar, 1.6, MarketSegment::LiquiditySensitive),
            row("US2", Rating::ThreeStar, 1.9, MarketSegment::Unrestricted),
        ];
        rank(&mut rows);

        let saudi = ResultFilter {
            segment: Some(MarketSegment::LiquiditySensitive),
            rating: None,
        };
        let picked: Vec<&str> = saudi.apply(&rows).iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(picked, vec!["SA1", "SA2"]);

        let three = ResultFilter {
            segment: None,
            rating: Some(Rating::ThreeStar),
        };
        let picked: Vec<&str> = three.apply(&rows).iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(picked, vec!["US2", "SA2"]);

        assert_eq!(ResultFilter::default().apply(&rows).len(), 4);
    }
}
