use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::AbortHandle;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use swing_scanner::comfy_table;
use swing_scanner::logging::init_logging;
use swing_scanner::ranking;
use swing_scanner::storage_utils::{AppConfig, AsyncStorageManager};
use swing_scanner::yahoo::YahooBarSource;
use swing_scanner::{CachedBarSource, ScanProgress, ScanReport, ScanRequest, Scanner};

#[derive(Serialize)]
struct LatestResults {
    scan_time: DateTime<Utc>,
    reports: Vec<ScanReport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Step 1: Load configuration (a default config.json is written on first run)
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config: AppConfig = storage.load_or_init("config").await?;
    init_logging(&config.log_level);
    let markets = config.selected_markets()?;
    let filter = config.result_filter()?;

    // Step 2: Scan each market
    let source = CachedBarSource::new(
        YahooBarSource::new(config.scan.requests_per_minute)?,
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.max_entries,
    );
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ScanProgress>();
    let scanner = Scanner::new(source, config.scan.clone()).with_progress(progress_tx);
    let progress_task = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            eprint!("\r  {:>3.0}% ({}/{})", p.fraction() * 100.0, p.completed, p.total);
            if p.completed == p.total {
                eprintln!();
            }
        }
    });

    let scan_time = Utc::now();
    let mut reports = Vec::with_capacity(markets.len());
    for (name, market) in markets {
        println!("\n--- Scanning {} ({} symbols) ---", name, market.symbols.len());
        let request = ScanRequest {
            symbols: market.symbols.clone(),
            segment: market.segment,
            lookback: config.scan.lookback(),
            interval: config.scan.interval,
        };

        let (abort, registration) = AbortHandle::new_pair();
        let ctrl_c = tokio::spawn({
            let abort = abort.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    abort.abort();
                }
            }
        });
        let report = scanner.scan_abortable(&request, registration).await?;
        ctrl_c.abort();

        info!(market = name, summary = %report.summary(), "market scanned");
        reports.push(report);
        if abort.is_aborted() {
            warn!("scan interrupted, skipping remaining markets");
            break;
        }
    }
    drop(scanner);
    let _ = progress_task.await;

    // Step 3: Save results
    let latest = LatestResults { scan_time, reports };
    storage.save("latest_results", &latest).await?;

    // Step 4: Display table
    let mut rows: Vec<_> = latest
        .reports
        .iter()
        .flat_map(|r| r.results.iter().cloned())
        .collect();
    ranking::rank(&mut rows);
    let shown = filter.apply(&rows);
    println!("{}", comfy_table::render(&shown, latest.scan_time, config.display.limit));

    Ok(())
}
