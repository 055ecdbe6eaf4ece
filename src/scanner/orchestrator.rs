use super::TimeframeAnalyzer;
use crate::models::{ScanSummary, SymbolScanResult};
use crate::notify::{messages, Notifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Scheduling knobs for one scan run
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Evaluated in this order for every symbol
    pub timeframes: Vec<String>,
    /// Symbols scanned concurrently
    pub max_workers: usize,
    /// Pause after each timeframe request
    pub request_delay: Duration,
    /// Progress is reported every this many symbols
    pub progress_interval: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeframes: ["15m", "30m", "1h", "2h", "4h", "8h", "1d", "1w"]
                .iter()
                .map(|tf| tf.to_string())
                .collect(),
            max_workers: 8,
            request_delay: Duration::from_millis(500),
            progress_interval: 100,
        }
    }
}

/// Fans symbols out over a bounded worker pool
///
/// Within a symbol timeframes run strictly in order, one request at a time.
/// Across symbols at most `max_workers` sweeps are in flight. Results are
/// folded into the summary in completion order by a single collecting loop.
pub struct ScanOrchestrator {
    analyzer: Arc<TimeframeAnalyzer>,
    notifier: Arc<dyn Notifier>,
    options: ScanOptions,
}

impl ScanOrchestrator {
    pub fn new(
        analyzer: Arc<TimeframeAnalyzer>,
        notifier: Arc<dyn Notifier>,
        options: ScanOptions,
    ) -> Self {
        Self {
            analyzer,
            notifier,
            options,
        }
    }

    pub async fn run(&self, symbols: Vec<String>) -> ScanSummary {
        let mut summary = ScanSummary::new(symbols.len());
        if symbols.is_empty() {
            tracing::warn!("No symbols to scan");
            summary.finish();
            return summary;
        }

        tracing::info!(
            "Analyzing {} pairs across {} timeframes with {} workers",
            symbols.len(),
            self.options.timeframes.len(),
            self.options.max_workers
        );
        self.notifier
            .send(&messages::run_started(
                symbols.len(),
                self.analyzer.candle_limit(),
            ))
            .await;

        let workers = self.options.max_workers.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(workers));
        let timeframes: Arc<[String]> = self.options.timeframes.clone().into();
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let permits = permits.clone();
            let analyzer = self.analyzer.clone();
            let notifier = self.notifier.clone();
            let timeframes = timeframes.clone();
            let delay = self.options.request_delay;

            tasks.spawn(async move {
                // Held for the whole sweep of this symbol
                let Ok(_permit) = permits.acquire_owned().await else {
                    return SymbolScanResult::new(symbol);
                };
                scan_symbol(&analyzer, notifier.as_ref(), symbol, &timeframes, delay).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => summary.record(&result),
                Err(e) => {
                    tracing::error!("Symbol task failed: {}", e);
                    summary.record_failure();
                }
            }

            if summary.progress_due(self.options.progress_interval) {
                let progress = messages::progress(&summary);
                tracing::info!("{}", progress);
                self.notifier.send(&progress).await;
            }
        }

        summary.finish();
        tracing::info!(
            "Scan finished in {}s: {}/{} pairs matched ({} failed)",
            summary.elapsed().num_seconds(),
            summary.matched_count(),
            summary.total,
            summary.failed
        );
        self.notifier.send(&messages::scan_complete(&summary)).await;

        summary
    }
}

/// Sequential sweep of one symbol over all timeframes
pub async fn scan_symbol(
    analyzer: &TimeframeAnalyzer,
    notifier: &dyn Notifier,
    symbol: String,
    timeframes: &[String],
    delay: Duration,
) -> SymbolScanResult {
    let mut result = SymbolScanResult::new(symbol);

    for timeframe in timeframes {
        let outcome = analyzer.analyze(&result.symbol, timeframe).await;
        if outcome.matched {
            result.matched_timeframes.push(outcome.timeframe);
        }
        tokio::time::sleep(delay).await;
    }

    if result.has_matches() {
        notifier.send(&messages::symbol_summary(&result)).await;
    }

    result
}
