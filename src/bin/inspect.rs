//! Pattern inspection for a single symbol
//!
//! Fetches each timeframe and prints the reference group the detector picked,
//! the retracement floor and why the tail passed or failed. Sends nothing.

use anyhow::{Context, Result};
use clap::Parser;
use pairscan::api::{BinanceClient, BinanceOptions};
use pairscan::config::Settings;
use pairscan::models::Candle;
use pairscan::pattern::{check_tail, find_reference_group, TailVerdict};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect")]
#[command(about = "Show pattern diagnostics for one symbol")]
struct Args {
    /// Symbol to inspect, e.g. BTCUSDT
    symbol: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Timeframes to inspect (comma separated, defaults to configured list)
    #[arg(long, value_delimiter = ',')]
    timeframes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("pairscan=warn")
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    let timeframes = if args.timeframes.is_empty() {
        settings.timeframes.clone()
    } else {
        args.timeframes.clone()
    };

    let client = BinanceClient::new(BinanceOptions {
        base_url: settings.binance_api_url.clone(),
        quote_asset: settings.quote_asset.clone(),
        timeout: settings.http_timeout(),
        requests_per_minute: settings.max_requests_per_minute,
    })
    .context("Failed to build Binance client")?;

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          PATTERN INSPECTION: {:<25}║", args.symbol);
    println!("╚═══════════════════════════════════════════════════════╝");
    println!(
        "Group size {}..={}, floor at {:.0}% retracement, recovery {:.0}%\n",
        settings.pattern.min_group_size,
        settings.pattern.max_group_size,
        settings.pattern.max_retracement * 100.0,
        settings.pattern.recovery_ratio * 100.0
    );

    for timeframe in &timeframes {
        println!("── {} ──", timeframe);

        let records = match client
            .fetch_klines(&args.symbol, timeframe, settings.candle_limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                println!("   ⚠️  Fetch failed: {}\n", e);
                continue;
            }
        };

        if records.len() < settings.candle_limit {
            println!(
                "   ⚠️  Only {}/{} candles - skipped\n",
                records.len(),
                settings.candle_limit
            );
            continue;
        }

        let candles: Vec<Candle> = records.iter().map(|r| Candle::from_raw(r)).collect();
        let group = find_reference_group(&candles, &settings.pattern);

        match &group {
            Some(g) => {
                println!(
                    "   Reference group: candles {}..{} (size {})",
                    g.start_index,
                    g.tail_start() - 1,
                    g.size
                );
                println!("   High: {:.8}  Low: {:.8}", g.max_high, g.min_low);
                println!(
                    "   Floor: {:.8}  Tail: {} candles",
                    g.retracement_floor(settings.pattern.max_retracement),
                    candles.len().saturating_sub(g.tail_start())
                );
            }
            None => println!("   No ascending green group"),
        }

        let verdict = check_tail(group.as_ref(), &candles, &settings.pattern);
        println!("   {}\n", describe(&verdict));
    }

    Ok(())
}

fn describe(verdict: &TailVerdict) -> String {
    match verdict {
        TailVerdict::Confirmed => "✅ MATCH".to_string(),
        TailVerdict::NoGroup => "❌ No reference group".to_string(),
        TailVerdict::ShortTail {
            remaining,
            required,
        } => format!("❌ Tail too short: {} < {}", remaining, required),
        TailVerdict::AboveReferenceHigh { index, high } => {
            format!("❌ Candle {} broke the group high ({:.8})", index, high)
        }
        TailVerdict::BelowRetracementFloor { index, low, floor } => format!(
            "❌ Candle {} fell below the floor ({:.8} < {:.8})",
            index, low, floor
        ),
        TailVerdict::WeakRecovery {
            last_high,
            required,
        } => format!(
            "❌ Last candle too weak ({:.8} < {:.8})",
            last_high, required
        ),
    }
}
