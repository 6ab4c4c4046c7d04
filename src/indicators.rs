//! Indicator engine: moving averages, RSI, volume average and ATR over a bar series.

use crate::bars::Bar;
use std::fmt;
use ta::indicators::{Maximum, SimpleMovingAverage, TrueRange};
use ta::{Next, Period, Reset};
use thiserror::Error;

pub const SMA_FAST: usize = 20;
pub const SMA_MID: usize = 50;
pub const SMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const VOLUME_AVG_PERIOD: usize = 20;
pub const ATR_PERIOD: usize = 14;
pub const BREAKOUT_WINDOW: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot build {name} indicator: {detail}")]
pub struct IndicatorError {
    name: &'static str,
    detail: String,
}

fn window<T, E: fmt::Debug>(name: &'static str, built: Result<T, E>) -> Result<T, IndicatorError> {
    built.map_err(|e| IndicatorError {
        name,
        detail: format!("{:?}", e),
    })
}

/// Wilder's RSI. Yields `None` until `period` price changes have been seen.
///
/// The first average gain/loss is the plain mean of the first `period`
/// changes; later values use Wilder smoothing. A window without losses
/// reads 100.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderRsi {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError {
                name: "rsi",
                detail: "period must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            period,
            prev_close: None,
            seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        })
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Next<f64> for WilderRsi {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Self::Output {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };

        let n = self.period as f64;
        self.seen += 1;
        if self.seen <= self.period {
            self.avg_gain += gain / n;
            self.avg_loss += loss / n;
            if self.seen < self.period {
                return None;
            }
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }
        Some(self.value())
    }
}

impl Period for WilderRsi {
    fn period(&self) -> usize {
        self.period
    }
}

impl Reset for WilderRsi {
    fn reset(&mut self) {
        self.prev_close = None;
        self.seen = 0;
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
    }
}

// Runs a `ta` indicator over the inputs, hiding values from the warm-up bars.
fn trailing<I, T>(mut indicator: I, inputs: impl IntoIterator<Item = T>) -> Vec<Option<f64>>
where
    I: Next<T, Output = f64> + Period,
{
    let period = indicator.period();
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let value = indicator.next(input);
            (i + 1 >= period).then_some(value)
        })
        .collect()
}

/// Per-bar indicator values, aligned index-for-index with the source bars.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub sma_fast: Vec<Option<f64>>,
    pub sma_mid: Vec<Option<f64>>,
    pub sma_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub breakout_high: Vec<Option<f64>>,
}

/// Indicator values for a single bar, present only once every window is warm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub sma_fast: f64,
    pub sma_mid: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub volume_avg: f64,
    pub atr: f64,
    pub breakout_high: f64,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar]) -> Result<Self, IndicatorError> {
        let closes = || bars.iter().map(|b| b.close);

        let mut rsi = WilderRsi::new(RSI_PERIOD)?;
        let rsi = closes().map(|c| rsi.next(c)).collect();

        // True range needs the previous close, so ATR starts one bar late.
        let mut true_range = TrueRange::new();
        if let Some(first) = bars.first() {
            true_range.next(first);
        }
        let ranges = bars.iter().skip(1).map(|b| true_range.next(b));
        let mut atr = vec![None; bars.len().min(1)];
        atr.extend(trailing(
            window("atr", SimpleMovingAverage::new(ATR_PERIOD))?,
            ranges,
        ));

        Ok(Self {
            sma_fast: trailing(window("sma", SimpleMovingAverage::new(SMA_FAST))?, closes()),
            sma_mid: trailing(window("sma", SimpleMovingAverage::new(SMA_MID))?, closes()),
            sma_slow: trailing(window("sma", SimpleMovingAverage::new(SMA_SLOW))?, closes()),
            rsi,
            volume_avg: trailing(
                window("volume average", SimpleMovingAverage::new(VOLUME_AVG_PERIOD))?,
                bars.iter().map(|b| b.volume),
            ),
            atr,
            breakout_high: trailing(
                window("breakout high", Maximum::new(BREAKOUT_WINDOW))?,
                bars.iter().map(|b| b.high),
            ),
        })
    }

    pub fn len(&self) -> usize {
        self.sma_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sma_fast.is_empty()
    }

    pub fn snapshot_at(&self, index: usize) -> Option<IndicatorSnapshot> {
        Some(IndicatorSnapshot {
            sma_fast: (*self.sma_fast.get(index)?)?,
            sma_mid: (*self.sma_mid.get(index)?)?,
            sma_slow: (*self.sma_slow.get(index)?)?,
            rsi: (*self.rsi.get(index)?)?,
            volume_avg: (*self.volume_avg.get(index)?)?,
            atr: (*self.atr.get(index)?)?,
            breakout_high: (*self.breakout_high.get(index)?)?,
        })
    }

    /// Values on the most recent bar.
    pub fn latest(&self) -> Option<IndicatorSnapshot> {
        self.snapshot_at(self.len().checked_sub(1)?)
    }
}
