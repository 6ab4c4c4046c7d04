//! The bar source boundary: the capability the scanner consumes and a
//! bounded TTL cache that can sit in front of any implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::bars::{BarSeries, Interval, SeriesError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarSourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited{}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("no data for symbol: {0}")]
    NotFound(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unexpected HTTP status {0}")]
    Http(u16),
    /// The payload parsed but its bars do not form a valid series.
    #[error("invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

/// Supplies OHLCV history for one symbol.
#[async_trait]
pub trait BarSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_history(
        &self,
        symbol: &str,
        lookback: Duration,
        interval: Interval,
    ) -> Result<BarSeries, BarSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    lookback: Duration,
    interval: Interval,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    series: BarSeries,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Wraps a source with an in-memory cache of successful fetches.
///
/// Entries expire after `ttl`. When `max_entries` is reached, expired
/// entries are dropped first, then the oldest one. Failures are never cached.
pub struct CachedBarSource<S> {
    inner: S,
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl<S: BarSource> CachedBarSource<S> {
    pub fn new(inner: S, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lookup(&self, key: &CacheKey) -> Option<BarSeries> {
        let mut state = self.state.lock().ok()?;
        let fresh = state
            .entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.series.clone());
        match fresh {
            Some(_) => state.hits += 1,
            None => {
                state.entries.remove(key);
                state.misses += 1;
            }
        }
        fresh
    }

    fn store(&self, key: CacheKey, series: BarSeries) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            let ttl = self.ttl;
            state.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        }
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }
        state.entries.insert(
            key,
            CacheEntry {
                series,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops every cached lookback/interval for `symbol`.
    pub fn invalidate(&self, symbol: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.retain(|key, _| key.symbol != symbol);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.state
            .lock()
            .map(|state| CacheStats {
                entries: state.entries.len(),
                hits: state.hits,
                misses: state.misses,
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl<S: BarSource> BarSource for CachedBarSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        lookback: Duration,
        interval: Interval,
    ) -> Result<BarSeries, BarSourceError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            lookback,
            interval,
        };
        if let Some(series) = self.lookup(&key) {
            debug!(symbol, source = self.inner.name(), "bar cache hit");
            return Ok(series);
        }

        let series = self.inner.fetch_history(symbol, lookback, interval).await?;
        self.store(key, series.clone());
        Ok(series)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bars::Bar;
    use crate::test_support::rising_bars;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source: canned outcomes per symbol, optional delay, call counter.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub outcomes: HashMap<String, Result<Vec<Bar>, BarSourceError>>,
        pub delays: HashMap<String, Duration>,
        pub calls: AtomicUsize,
    }

    impl StubSource {
        pub fn with(mut self, symbol: &str, outcome: Result<Vec<Bar>, BarSourceError>) -> Self {
            self.outcomes.insert(symbol.to_string(), outcome);
            self
        }

        pub fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
            self.delays.insert(symbol.to_string(), delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BarSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_history(
            &self,
            symbol: &str,
            _lookback: Duration,
            interval: Interval,
        ) -> Result<BarSeries, BarSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(symbol) {
                tokio::time::sleep(*delay).await;
            }
            match self.outcomes.get(symbol) {
                Some(Ok(bars)) => Ok(BarSeries::new(symbol, interval, bars.clone())?),
                Some(Err(e)) => Err(e.clone()),
                None => Err(BarSourceError::NotFound(symbol.to_string())),
            }
        }
    }

    const LOOKBACK: Duration = Duration::from_secs(86_400 * 30);

    #[tokio::test]
    async fn repeated_fetch_is_served_from_cache() {
        let cached = CachedBarSource::new(
            StubSource::default().with("AAPL", Ok(rising_bars(5))),
            Duration::from_secs(60),
            8,
        );
        let first = cached.fetch_history("AAPL", LOOKBACK, Interval::Day1).await.unwrap();
        let second = cached.fetch_history("AAPL", LOOKBACK, Interval::Day1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().calls(), 1);
        assert_eq!(cached.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn different_interval_is_a_different_entry() {
        let cached = CachedBarSource::new(
            StubSource::default().with("AAPL", Ok(rising_bars(5))),
            Duration::from_secs(60),
            8,
        );
        cached.fetch_history("AAPL", LOOKBACK, Interval::Day1).await.unwrap();
        cached.fetch_history("AAPL", LOOKBACK, Interval::Week1).await.unwrap();
        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cached = CachedBarSource::new(
            StubSource::default().with("AAPL", Ok(rising_bars(5))),
            Duration::from_secs(60),
            8,
        );
        cached.fetch_history("AAPL", LOOKBACK, Interval::Day1).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cached.fetch_history("AAPL", LOOKBACK, Interval::Day1).await.unwrap();
        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest() {
        let stub = StubSource::default()
            .with("A", Ok(rising_bars(5)))
            .with("B", Ok(rising_bars(5)))
            .with("C", Ok(rising_bars(5)));
        let cached = CachedBarSource::new(stub, Duration::from_secs(600), 2);
        for symbol in ["A", "B", "C"] {
            cached.fetch_history(symbol, LOOKBACK, Interval::Day1).await.unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(cached.stats().entries, 2);
        // A was evicted, B and C are still cached.
        cached.fetch_history("B", LOOKBACK, Interval::Day1).await.unwrap();
        cached.fetch_history("C", LOOKBACK, Interval::Day1).await.unwrap();
        assert_eq!(cached.inner().calls(), 3);
        cached.fetch_history("A", LOOKBACK, Interval::Day1).await.unwrap();
        assert_eq!(cached.inner().calls(), 4);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedBarSource::new(
            StubSource::default().with("GONE", Err(BarSourceError::Network("reset".into()))),
            Duration::from_secs(60),
            8,
        );
        assert!(cached.fetch_history("GONE", LOOKBACK, Interval::Day1).await.is_err());
        assert!(cached.fetch_history("GONE", LOOKBACK, Interval::Day1).await.is_err());
        assert_eq!(cached.inner().calls(), 2);
        assert_eq!(cached.stats().entries, 0);
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cached = CachedBarSource::new(
            StubSource::default()
                .with("A", Ok(rising_bars(5)))
                .with("B", Ok(rising_bars(5))),
            Duration::from_secs(60),
            8,
        );
        cached.fetch_history("A", LOOKBACK, Interval::Day1).await.unwrap();
        cached.fetch_history("B", LOOKBACK, Interval::Day1).await.unwrap();
        cached.invalidate("A");
        assert_eq!(cached.stats().entries, 1);
        cached.clear();
        assert_eq!(cached.stats().entries, 0);
    }

    #[test]
    fn rate_limit_message_mentions_retry() {
        let err = BarSourceError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 30s");
        let bare = BarSourceError::RateLimited { retry_after: None };
        assert_eq!(bare.to_string(), "rate limited");
    }
}
