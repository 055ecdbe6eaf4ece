use async_trait::async_trait;
use pairscan::api::MarketDataSource;
use pairscan::models::RawCandle;
use pairscan::notify::{Notifier, RetryPolicy};
use pairscan::scanner::{scan_symbol, ScanOptions, ScanOrchestrator, TimeframeAnalyzer};
use pairscan::{PatternConfig, Result};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LIMIT: usize = 50;

// ============================================================================
// Fixtures
// ============================================================================

fn raw(open: f64, high: f64, low: f64, close: f64) -> RawCandle {
    vec![
        json!(1_700_000_000_000u64),
        json!(open.to_string()),
        json!(high.to_string()),
        json!(low.to_string()),
        json!(close.to_string()),
        json!("1000.0"),
    ]
}

/// Green run at 10..=12 (high 12, low 8.8, midpoint 10.4) then a contained tail
fn matching_series(len: usize) -> Vec<RawCandle> {
    let mut candles = vec![raw(10.0, 10.0, 9.0, 9.5); 10];
    candles.push(raw(9.0, 10.0, 8.8, 9.8));
    candles.push(raw(9.8, 10.8, 9.6, 10.6));
    candles.push(raw(10.6, 12.0, 10.4, 11.5));
    while candles.len() < len {
        candles.push(raw(11.5, 11.8, 10.9, 11.0));
    }
    candles
}

fn flat_series(len: usize) -> Vec<RawCandle> {
    vec![raw(10.0, 10.5, 9.5, 10.0); len]
}

/// In-memory market data keyed by (symbol, timeframe)
///
/// Unknown keys return a flat series. Tracks how many fetches overlap.
#[derive(Default)]
struct FakeMarket {
    series: HashMap<(String, String), Vec<RawCandle>>,
    failing: HashSet<(String, String)>,
    panicking: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Duration,
}

impl FakeMarket {
    fn with_series(mut self, symbol: &str, timeframe: &str, series: Vec<RawCandle>) -> Self {
        self.series
            .insert((symbol.to_string(), timeframe.to_string()), series);
        self
    }

    fn failing_on(mut self, symbol: &str, timeframe: &str) -> Self {
        self.failing
            .insert((symbol.to_string(), timeframe.to_string()));
        self
    }

    fn calls_for(&self, symbol: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, tf)| tf.clone())
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<RawCandle>> {
        let key = (symbol.to_string(), timeframe.to_string());
        self.calls.lock().unwrap().push(key.clone());

        if self.panicking.contains(symbol) {
            panic!("market data blew up for {}", symbol);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&key) {
            return Err(format!("HTTP 503 for {} {}", symbol, timeframe).into());
        }

        Ok(self
            .series
            .get(&key)
            .cloned()
            .unwrap_or_else(|| flat_series(limit)))
    }
}

/// Records every message; can be told to fail every attempt
#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    always_fail: bool,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn containing(&self, needle: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.contains(needle))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn try_send(&self, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err("telegram unreachable".into());
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }
}

fn options(timeframes: &[&str], workers: usize) -> ScanOptions {
    ScanOptions {
        timeframes: timeframes.iter().map(|tf| tf.to_string()).collect(),
        max_workers: workers,
        request_delay: Duration::ZERO,
        progress_interval: 100,
    }
}

fn orchestrator(
    market: Arc<FakeMarket>,
    notifier: Arc<RecordingNotifier>,
    options: ScanOptions,
) -> ScanOrchestrator {
    let analyzer = Arc::new(TimeframeAnalyzer::new(
        market,
        notifier.clone(),
        PatternConfig::default(),
        LIMIT,
    ));
    ScanOrchestrator::new(analyzer, notifier, options)
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Timeframe analyzer
// ============================================================================

#[tokio::test]
async fn test_analyzer_matches_full_setup() {
    let market = Arc::new(FakeMarket::default().with_series("BTCUSDT", "1h", matching_series(LIMIT)));
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier.clone(), PatternConfig::default(), LIMIT);

    let result = analyzer.analyze("BTCUSDT", "1h").await;

    assert!(result.matched);
    assert_eq!(result.timeframe, "1h");
    assert_eq!(
        notifier.messages(),
        vec!["✅ *ALERT:* BTCUSDT valid in 1h timeframe!".to_string()]
    );
}

#[tokio::test]
async fn test_analyzer_rejects_dip_below_midpoint() {
    let mut series = matching_series(LIMIT);
    series[30] = raw(11.5, 11.8, 10.0, 11.0);
    let market = Arc::new(FakeMarket::default().with_series("BTCUSDT", "1h", series));
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier.clone(), PatternConfig::default(), LIMIT);

    let result = analyzer.analyze("BTCUSDT", "1h").await;

    assert!(!result.matched);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_analyzer_short_series_is_no_match() {
    // 49 candles that would otherwise match
    let market = Arc::new(FakeMarket::default().with_series(
        "BTCUSDT",
        "1h",
        matching_series(LIMIT - 1),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier.clone(), PatternConfig::default(), LIMIT);

    assert!(!analyzer.analyze("BTCUSDT", "1h").await.matched);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_analyzer_fetch_error_is_no_match() {
    let market = Arc::new(
        FakeMarket::default()
            .with_series("BTCUSDT", "1h", matching_series(LIMIT))
            .failing_on("BTCUSDT", "1h"),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier, PatternConfig::default(), LIMIT);

    assert!(!analyzer.analyze("BTCUSDT", "1h").await.matched);
}

#[tokio::test]
async fn test_analyzer_malformed_candles_do_not_abort() {
    let mut series = matching_series(LIMIT);
    series[3] = vec![json!("garbage")];
    series[5] = vec![];
    let market = Arc::new(FakeMarket::default().with_series("BTCUSDT", "1h", series));
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier, PatternConfig::default(), LIMIT);

    // Zero candles before the group are red/neutral and change nothing
    assert!(analyzer.analyze("BTCUSDT", "1h").await.matched);
}

#[tokio::test]
async fn test_analyzer_is_repeatable() {
    let market = Arc::new(FakeMarket::default().with_series("BTCUSDT", "1h", matching_series(LIMIT)));
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market, notifier, PatternConfig::default(), LIMIT);

    let first = analyzer.analyze("BTCUSDT", "1h").await;
    let second = analyzer.analyze("BTCUSDT", "1h").await;
    assert_eq!(first, second);
}

// ============================================================================
// Scan orchestrator
// ============================================================================

#[tokio::test]
async fn test_scan_reports_matches_per_symbol() {
    let market = Arc::new(
        FakeMarket::default()
            .with_series("BTCUSDT", "15m", matching_series(LIMIT))
            .with_series("BTCUSDT", "4h", matching_series(LIMIT))
            .with_series("SOLUSDT", "1h", matching_series(LIMIT)),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(
        market.clone(),
        notifier.clone(),
        options(&["15m", "1h", "4h"], 2),
    );

    let summary = scan.run(symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])).await;

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.matched_count(), 2);
    let mut matched = summary.matched_symbols.clone();
    matched.sort();
    assert_eq!(matched, vec!["BTCUSDT", "SOLUSDT"]);

    // Timeframes are always swept in configured order
    assert_eq!(market.calls_for("BTCUSDT"), vec!["15m", "1h", "4h"]);
    assert_eq!(market.calls_for("ETHUSDT"), vec!["15m", "1h", "4h"]);

    let messages = notifier.messages();
    assert_eq!(
        messages.first().map(String::as_str),
        Some("🚀 Starting analysis of 3 pairs with 50 candles per timeframe...")
    );
    assert_eq!(
        messages.last().map(String::as_str),
        Some("🔥 Analysis complete! Found 2 qualifying pairs.")
    );
    assert_eq!(notifier.containing("*ALERT:*").len(), 3);
    assert_eq!(
        notifier.containing("Summary for BTCUSDT"),
        vec!["📊 Summary for BTCUSDT: Valid in 2 timeframes:\n- 15m\n- 4h".to_string()]
    );
    assert!(notifier.containing("Summary for ETHUSDT").is_empty());
    assert_eq!(
        notifier.containing("Progress"),
        vec!["📊 Progress: 3/3 pairs processed. Found 2 valid pairs so far.".to_string()]
    );
}

#[tokio::test]
async fn test_symbol_summary_follows_its_alerts() {
    let market = Arc::new(
        FakeMarket::default()
            .with_series("BTCUSDT", "1h", matching_series(LIMIT))
            .with_series("BTCUSDT", "1d", matching_series(LIMIT)),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market, notifier.clone(), options(&["1h", "4h", "1d"], 1));

    scan.run(symbols(&["BTCUSDT"])).await;

    let messages = notifier.messages();
    let position = |needle: &str| messages.iter().position(|m| m.contains(needle)).unwrap();
    assert!(position("valid in 1h") < position("valid in 1d"));
    assert!(position("valid in 1d") < position("Summary for BTCUSDT"));
    assert!(position("Summary for BTCUSDT") < position("Progress"));
}

#[tokio::test]
async fn test_no_matches_final_message() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market, notifier.clone(), options(&["1h"], 4));

    let summary = scan.run(symbols(&["BTCUSDT", "ETHUSDT"])).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.matched_count(), 0);
    assert_eq!(
        notifier.messages().last().map(String::as_str),
        Some("❌ No valid pairs found.")
    );
}

#[tokio::test]
async fn test_empty_symbol_list_exits_early() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market.clone(), notifier.clone(), options(&["1h"], 4));

    let summary = scan.run(Vec::new()).await;

    assert_eq!(summary.total, 0);
    assert_eq!(summary.processed, 0);
    assert!(notifier.messages().is_empty());
    assert!(market.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_failures_are_contained() {
    let market = Arc::new(
        FakeMarket::default()
            .with_series("BTCUSDT", "4h", matching_series(LIMIT))
            .failing_on("BTCUSDT", "1h")
            .failing_on("ETHUSDT", "1h")
            .failing_on("ETHUSDT", "4h"),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market.clone(), notifier, options(&["1h", "4h"], 2));

    let summary = scan.run(symbols(&["BTCUSDT", "ETHUSDT"])).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.matched_symbols, vec!["BTCUSDT"]);
    // The failed timeframe did not stop the sweep
    assert_eq!(market.calls_for("BTCUSDT"), vec!["1h", "4h"]);
}

#[tokio::test]
async fn test_panicking_symbol_does_not_sink_the_run() {
    let mut market = FakeMarket::default().with_series("ETHUSDT", "1h", matching_series(LIMIT));
    market.panicking.insert("BTCUSDT".to_string());
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(Arc::new(market), notifier, options(&["1h"], 2));

    let summary = scan.run(symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])).await;

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.matched_symbols, vec!["ETHUSDT"]);
}

#[tokio::test]
async fn test_notification_failures_never_abort() {
    let market = Arc::new(FakeMarket::default().with_series("BTCUSDT", "1h", matching_series(LIMIT)));
    let notifier = Arc::new(RecordingNotifier {
        always_fail: true,
        ..RecordingNotifier::default()
    });
    let scan = orchestrator(market, notifier.clone(), options(&["1h"], 1));

    let summary = scan.run(symbols(&["BTCUSDT"])).await;

    assert_eq!(summary.matched_symbols, vec!["BTCUSDT"]);
    // start, alert, symbol summary, progress, final: 3 attempts each
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 15);
}

#[tokio::test]
async fn test_progress_every_interval_and_at_end() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut opts = options(&["1h"], 3);
    opts.progress_interval = 2;
    let scan = orchestrator(market, notifier.clone(), opts);

    let names: Vec<String> = (0..5).map(|i| format!("COIN{}USDT", i)).collect();
    scan.run(names).await;

    let progress = notifier.containing("Progress");
    assert_eq!(progress.len(), 3);
    assert!(progress[0].starts_with("📊 Progress: 2/5"));
    assert!(progress[1].starts_with("📊 Progress: 4/5"));
    assert!(progress[2].starts_with("📊 Progress: 5/5"));
}

#[tokio::test]
async fn test_counts_are_exact_for_any_worker_count() {
    let timeframes = ["15m", "1h", "4h", "1d"];
    let total = 24;

    for workers in [1, 3, 8, 32] {
        let mut market = FakeMarket {
            latency: Duration::from_millis(1),
            ..FakeMarket::default()
        };
        // Every third symbol matches on one timeframe
        let mut expected = 0;
        for i in 0..total {
            if i % 3 == 0 {
                let tf = timeframes[i % timeframes.len()];
                market = market.with_series(&format!("COIN{}USDT", i), tf, matching_series(LIMIT));
                expected += 1;
            }
        }

        let market = Arc::new(market);
        let notifier = Arc::new(RecordingNotifier::default());
        let scan = orchestrator(market.clone(), notifier, options(&timeframes, workers));

        let names: Vec<String> = (0..total).map(|i| format!("COIN{}USDT", i)).collect();
        let summary = scan.run(names).await;

        assert_eq!(summary.processed, total, "workers = {}", workers);
        assert_eq!(summary.matched_count(), expected, "workers = {}", workers);
        assert_eq!(
            market.calls.lock().unwrap().len(),
            total * timeframes.len(),
            "workers = {}",
            workers
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_pool_bounds_concurrent_requests() {
    let market = Arc::new(FakeMarket {
        latency: Duration::from_millis(5),
        ..FakeMarket::default()
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market.clone(), notifier, options(&["15m", "1h"], 3));

    let names: Vec<String> = (0..12).map(|i| format!("COIN{}USDT", i)).collect();
    let summary = scan.run(names).await;

    assert_eq!(summary.processed, 12);
    let peak = market.peak_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight requests was {}", peak);
    assert!(peak >= 1);
}

// ============================================================================
// Request pacing (virtual clock)
// ============================================================================

fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{:?}, took {:?}",
        expected,
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_delay_follows_every_timeframe() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let analyzer = TimeframeAnalyzer::new(market.clone(), notifier.clone(), PatternConfig::default(), LIMIT);
    let timeframes: Vec<String> = ["15m", "1h", "4h"].iter().map(|tf| tf.to_string()).collect();

    let started = tokio::time::Instant::now();
    let result = scan_symbol(
        &analyzer,
        notifier.as_ref(),
        "BTCUSDT".to_string(),
        &timeframes,
        Duration::from_millis(500),
    )
    .await;

    assert!(!result.has_matches());
    assert_eq!(market.calls_for("BTCUSDT"), vec!["15m", "1h", "4h"]);
    assert_elapsed(started, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_single_worker_spaces_consecutive_symbols() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut opts = options(&["15m", "1h", "4h"], 1);
    opts.request_delay = Duration::from_millis(500);
    let scan = orchestrator(market, notifier, opts);

    let started = tokio::time::Instant::now();
    let summary = scan.run(symbols(&["AUSDT", "BUSDT", "CUSDT", "DUSDT"])).await;

    assert_eq!(summary.processed, 4);
    // 4 symbols x 3 timeframes x 500ms, one after another
    assert_elapsed(started, Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_workers_pace_independently() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut opts = options(&["15m", "1h", "4h"], 4);
    opts.request_delay = Duration::from_millis(500);
    let scan = orchestrator(market, notifier, opts);

    let started = tokio::time::Instant::now();
    scan.run(symbols(&["AUSDT", "BUSDT", "CUSDT", "DUSDT"])).await;

    assert_elapsed(started, Duration::from_millis(1500));
}

#[tokio::test]
async fn test_final_progress_not_duplicated_when_interval_divides_total() {
    let market = Arc::new(FakeMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut opts = options(&["1h"], 2);
    opts.progress_interval = 2;
    let scan = orchestrator(market, notifier.clone(), opts);

    scan.run(symbols(&["AUSDT", "BUSDT", "CUSDT", "DUSDT"])).await;

    let progress = notifier.containing("Progress");
    assert_eq!(progress.len(), 2);
    assert!(progress[0].starts_with("📊 Progress: 2/4"));
    assert!(progress[1].starts_with("📊 Progress: 4/4"));
}

#[tokio::test]
async fn test_oversized_worker_count_is_clamped() {
    let market = Arc::new(FakeMarket::default().with_series("BUSDT", "1h", matching_series(LIMIT)));
    let notifier = Arc::new(RecordingNotifier::default());
    let scan = orchestrator(market, notifier, options(&["1h"], usize::MAX));

    let summary = scan.run(symbols(&["AUSDT", "BUSDT"])).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.matched_symbols, vec!["BUSDT"]);
}
