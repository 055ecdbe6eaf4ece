use anyhow::{Context, Result};
use clap::Parser;
use pairscan::api::{BinanceClient, BinanceOptions, StaticSymbols, SymbolSource};
use pairscan::config::Settings;
use pairscan::notify::{LogNotifier, Notifier, RetryPolicy, TelegramNotifier};
use pairscan::scanner::{ScanOptions, ScanOrchestrator, TimeframeAnalyzer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pairscan")]
#[command(about = "Scan exchange pairs for ascending-group consolidation setups")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log notifications instead of sending them to Telegram
    #[arg(long)]
    dry_run: bool,

    /// Scan only these symbols (comma separated)
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Override the configured timeframes (comma separated)
    #[arg(long, value_delimiter = ',')]
    timeframes: Vec<String>,

    /// Override the worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "pairscan=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(&args.log_filter);

    let settings = load_settings(&args)?;

    let binance = BinanceClient::new(BinanceOptions {
        base_url: settings.binance_api_url.clone(),
        quote_asset: settings.quote_asset.clone(),
        timeout: settings.http_timeout(),
        requests_per_minute: settings.max_requests_per_minute,
    })
    .context("Failed to build Binance client")?;
    let notifier = build_notifier(&settings, args.dry_run)?;

    let symbols = if args.symbols.is_empty() {
        tracing::info!("🔍 Fetching {} pairs...", settings.quote_asset);
        binance.list_tradable_symbols().await
    } else {
        StaticSymbols(args.symbols.clone()).list_tradable_symbols().await
    };

    if symbols.is_empty() {
        tracing::warn!("No {} pairs found.", settings.quote_asset);
        return Ok(());
    }

    let analyzer = Arc::new(TimeframeAnalyzer::new(
        Arc::new(binance),
        notifier.clone(),
        settings.pattern.clone(),
        settings.candle_limit,
    ));
    let orchestrator = ScanOrchestrator::new(
        analyzer,
        notifier,
        ScanOptions {
            timeframes: settings.timeframes.clone(),
            max_workers: settings.max_workers,
            request_delay: settings.request_delay(),
            progress_interval: settings.progress_interval,
        },
    );

    let summary = orchestrator.run(symbols).await;

    tracing::info!("✅ Analysis complete. All results sent.");
    for symbol in &summary.matched_symbols {
        tracing::info!("  - {}", symbol);
    }

    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    if !args.timeframes.is_empty() {
        settings.timeframes = args.timeframes.clone();
    }
    if let Some(workers) = args.workers {
        settings.max_workers = workers;
    }
    settings.timeframes.retain(|tf| !tf.trim().is_empty());
    settings.validate().context("Invalid configuration")?;

    tracing::info!("📊 Configuration:");
    tracing::info!("  Timeframes: {}", settings.timeframes.join(", "));
    tracing::info!("  Workers: {}", settings.max_workers);
    tracing::info!("  Candles per timeframe: {}", settings.candle_limit);
    tracing::info!("  Request delay: {}ms", settings.request_delay_ms);

    Ok(settings)
}

fn build_notifier(settings: &Settings, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        tracing::info!("Dry run: notifications go to the log");
        return Ok(Arc::new(LogNotifier));
    }

    let (token, chat_id) = settings.telegram_credentials()?;
    let telegram = TelegramNotifier::with_base_url(
        &settings.telegram_api_url,
        token,
        chat_id,
        settings.http_timeout(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build Telegram client: {}", e))?
    .with_retry_policy(RetryPolicy {
        max_attempts: settings.notify_attempts,
        backoff: settings.notify_backoff(),
    });

    Ok(Arc::new(telegram))
}
