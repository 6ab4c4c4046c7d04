//! Scan orchestration.
//!
//! Each symbol is fetched and evaluated independently through a bounded
//! worker pool. The whole scan shares one deadline; symbols still in flight
//! when it passes (or when the scan is aborted) are dropped, never half
//! processed. A failing symbol only ever costs its own row.

use chrono::{DateTime, Utc};
use futures::future::{AbortRegistration, Abortable, Either};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::analysis::{self, AnalysisConfig, CandidateResult, MIN_BARS_FLOOR};
use crate::bar_source::{BarSource, BarSourceError};
use crate::bars::Interval;
use crate::error::{ScanError, SkipKind, SkipReason};
use crate::market_filter::MarketSegment;
use crate::ranking;
use crate::storage_utils::ScanConfig;

/// What the caller wants scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub symbols: Vec<String>,
    pub segment: MarketSegment,
    pub lookback: Duration,
    pub interval: Interval,
}

/// Sent once per finished symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub symbol: String,
    pub completed: usize,
    pub total: usize,
}

impl ScanProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub kind: SkipKind,
    pub reason: String,
}

/// Outcome of one scan: ranked rows plus the symbols that produced none.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub segment: MarketSegment,
    pub total: usize,
    pub results: Vec<CandidateResult>,
    pub skipped: Vec<SkippedSymbol>,
}

impl ScanReport {
    pub fn skip_counts(&self) -> BTreeMap<SkipKind, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        format!(
            "Scanned {} symbols ({}): {} candidates, {} skipped",
            self.total,
            self.segment,
            self.results.len(),
            self.skipped.len()
        )
    }
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z0-9^][A-Z0-9.\-^=]{0,19}$").expect("symbol pattern is valid")
    })
}

/// Trims, upper-cases and de-duplicates symbols, keeping first occurrences.
pub fn normalize_symbols(symbols: &[String]) -> Result<Vec<String>, ScanError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(symbols.len());
    for raw in symbols {
        let symbol = raw.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !symbol_pattern().is_match(&symbol) {
            return Err(ScanError::InvalidSymbol(raw.clone()));
        }
        if seen.insert(symbol.clone()) {
            normalized.push(symbol);
        }
    }
    if normalized.is_empty() {
        return Err(ScanError::EmptySymbolList);
    }
    Ok(normalized)
}

pub struct Scanner<S> {
    source: S,
    config: ScanConfig,
    progress: Option<UnboundedSender<ScanProgress>>,
}

impl<S: BarSource> Scanner<S> {
    pub fn new(source: S, config: ScanConfig) -> Self {
        Self {
            source,
            config,
            progress: None,
        }
    }

    /// Reports every finished symbol on `tx`. A closed receiver is ignored.
    pub fn with_progress(mut self, tx: UnboundedSender<ScanProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanReport, ScanError> {
        self.run(request, None).await
    }

    /// Like [`scan`](Self::scan), but stops between symbols once the paired
    /// `AbortHandle` fires. Rows produced before that are kept.
    pub async fn scan_abortable(
        &self,
        request: &ScanRequest,
        registration: AbortRegistration,
    ) -> Result<ScanReport, ScanError> {
        self.run(request, Some(registration)).await
    }

    fn validate(&self, request: &ScanRequest) -> Result<Vec<String>, ScanError> {
        let symbols = normalize_symbols(&request.symbols)?;
        self.config.validate()?;
        let required = u32::try_from(self.config.min_bars)
            .ok()
            .and_then(|bars| request.interval.duration().checked_mul(bars))
            .ok_or(ScanError::InvalidMinBars {
                got: self.config.min_bars,
                floor: MIN_BARS_FLOOR,
            })?;
        if request.lookback < required {
            return Err(ScanError::InvalidWindow {
                lookback: request.lookback,
                interval: request.interval.to_string(),
                min_bars: self.config.min_bars,
            });
        }
        Ok(symbols)
    }

    async fn run(
        &self,
        request: &ScanRequest,
        registration: Option<AbortRegistration>,
    ) -> Result<ScanReport, ScanError> {
        let symbols = self.validate(request)?;
        let total = symbols.len();
        let analysis = self.config.analysis();
        let scan_time = Utc::now();

        info!(
            symbols = total,
            segment = %request.segment,
            source = self.source.name(),
            "starting scan"
        );

        let mut pending: HashSet<String> = symbols.iter().cloned().collect();
        let mut results = Vec::new();
        let mut skipped = Vec::new();

        let work = stream::iter(symbols.iter().cloned())
            .map(|symbol| self.evaluate_symbol(symbol, request, analysis))
            .buffer_unordered(self.config.max_concurrency);
        let work = match registration {
            Some(registration) => Either::Left(Abortable::new(work, registration)),
            None => Either::Right(work),
        };
        let mut work = std::pin::pin!(work);

        let collect = async {
            while let Some((symbol, outcome)) = work.next().await {
                pending.remove(&symbol);
                match outcome {
                    Ok(candidate) => {
                        debug!(symbol = %symbol, rating = %candidate.rating, "candidate accepted");
                        results.push(candidate);
                    }
                    Err(reason) => {
                        log_skip(&symbol, &reason);
                        skipped.push(SkippedSymbol {
                            symbol: symbol.clone(),
                            kind: reason.kind(),
                            reason: reason.to_string(),
                        });
                    }
                }
                if let Some(tx) = &self.progress {
                    let _ = tx.send(ScanProgress {
                        symbol,
                        completed: total - pending.len(),
                        total,
                    });
                }
            }
        };
        let timed_out = tokio::time::timeout(self.config.timeout(), collect)
            .await
            .is_err();

        if !pending.is_empty() {
            let reason = if timed_out {
                SkipReason::TimedOut
            } else {
                SkipReason::Cancelled
            };
            warn!(unfinished = pending.len(), reason = %reason, "scan stopped early");
            // Keep the caller's symbol order for the unfinished tail.
            for symbol in symbols.iter().filter(|s| pending.contains(*s)) {
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    kind: reason.kind(),
                    reason: reason.to_string(),
                });
            }
        }

        ranking::rank(&mut results);
        let report = ScanReport {
            scan_time,
            segment: request.segment,
            total,
            results,
            skipped,
        };
        info!(summary = %report.summary(), "scan finished");
        Ok(report)
    }

    async fn evaluate_symbol(
        &self,
        symbol: String,
        request: &ScanRequest,
        analysis: AnalysisConfig,
    ) -> (String, Result<CandidateResult, SkipReason>) {
        let outcome = match self
            .source
            .fetch_history(&symbol, request.lookback, request.interval)
            .await
        {
            Ok(series) => analysis::evaluate_series(&series, request.segment, &analysis),
            Err(BarSourceError::InvalidSeries(e)) => Err(SkipReason::InvalidSeries(e)),
            Err(e) => Err(SkipReason::Provider(e)),
        };
        (symbol, outcome)
    }
}

fn log_skip(symbol: &str, reason: &SkipReason) {
    if let SkipReason::InvalidSeries(e) = reason {
        debug!(symbol, error = %e, "invalid series, skipping symbol");
        return;
    }
    match reason.kind() {
        SkipKind::Provider => warn!(symbol, error = %reason, "provider failure, skipping symbol"),
        SkipKind::InsufficientData => debug!(symbol, reason = %reason, "insufficient data, skipping symbol"),
        SkipKind::Degenerate => debug!(symbol, reason = %reason, "degenerate input, skipping symbol"),
        _ => debug!(symbol, reason = %reason, "symbol did not qualify"),
    }
}

/// One-shot scan without progress reporting or cancellation.
pub async fn scan<S: BarSource>(
    source: S,
    request: &ScanRequest,
    config: ScanConfig,
) -> Result<Vec<CandidateResult>, ScanError> {
    let report = Scanner::new(source, config).scan(request).await?;
    Ok(report.results)
}
