//! Daily/intraday history from the Yahoo Finance chart endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bar_source::{BarSource, BarSourceError};
use crate::bars::{Bar, BarSeries, Interval};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0";

// --- Response shape ---

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

// Yahoo leaves holes (null) for halted or still-forming bars.
#[derive(Deserialize, Debug, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn provider_interval(interval: Interval) -> &'static str {
    match interval {
        Interval::Hour1 => "60m",
        other => other.as_str(),
    }
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

/// Turns the column-oriented chart payload into bars, dropping incomplete
/// rows and any row that does not move time forward.
fn bars_from_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<Bar>, BarSourceError> {
    if let Some(error) = envelope.chart.error {
        let detail = error.description.unwrap_or_else(|| error.code.clone());
        return Err(if error.code.eq_ignore_ascii_case("Not Found") {
            BarSourceError::NotFound(symbol.to_string())
        } else {
            BarSourceError::Malformed(detail)
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| BarSourceError::NotFound(symbol.to_string()))?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<Bar> = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
            at(&quote.volume, i),
        ) else {
            continue;
        };
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(ts, 0) else {
            continue;
        };
        if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
            continue;
        }
        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    Ok(bars)
}

/// Spaces requests evenly so the provider's per-minute budget is never exceeded.
#[derive(Debug)]
struct Throttle {
    spacing: Duration,
    next_slot: Mutex<Instant>,
}

impl Throttle {
    fn new(requests_per_minute: u32) -> Self {
        let spacing = Duration::from_secs(60) / requests_per_minute.max(1);
        Self {
            spacing,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.spacing;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

pub struct YahooBarSource {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl YahooBarSource {
    pub fn new(requests_per_minute: u32) -> Result<Self, BarSourceError> {
        Self::with_base_url(DEFAULT_BASE_URL, requests_per_minute)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        requests_per_minute: u32,
    ) -> Result<Self, BarSourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(50)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| BarSourceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            throttle: Throttle::new(requests_per_minute),
        })
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl BarSource for YahooBarSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        lookback: Duration,
        interval: Interval,
    ) -> Result<BarSeries, BarSourceError> {
        self.throttle.acquire().await;

        let now = Utc::now().timestamp();
        let period1 = now.saturating_sub(lookback.as_secs() as i64);
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let query = [
            ("period1", period1.to_string()),
            ("period2", now.to_string()),
            ("interval", provider_interval(interval).to_string()),
            ("includePrePost", "false".to_string()),
        ];

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BarSourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers());
            warn!(symbol, ?retry_after, "rate limited by provider");
            return Err(BarSourceError::RateLimited { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BarSourceError::NotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(BarSourceError::Http(status.as_u16()));
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .map_err(|e| BarSourceError::Malformed(e.to_string()))?;
        let series = BarSeries::new(symbol, interval, bars_from_chart(symbol, envelope)?)?;
        debug!(
            symbol,
            bars = series.len(),
            interval = %series.interval(),
            "fetched history"
        );
        Ok(series)
    }
}
