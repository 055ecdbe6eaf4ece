//! Notification texts (Telegram Markdown)

use crate::models::{ScanSummary, SymbolScanResult};

pub fn run_started(pairs: usize, candle_limit: usize) -> String {
    format!(
        "🚀 Starting analysis of {} pairs with {} candles per timeframe...",
        pairs, candle_limit
    )
}

pub fn match_alert(symbol: &str, timeframe: &str) -> String {
    format!("✅ *ALERT:* {} valid in {} timeframe!", symbol, timeframe)
}

pub fn symbol_summary(result: &SymbolScanResult) -> String {
    let lines: Vec<String> = result
        .matched_timeframes
        .iter()
        .map(|tf| format!("- {}", tf))
        .collect();

    format!(
        "📊 Summary for {}: Valid in {} timeframes:\n{}",
        result.symbol,
        result.matched_timeframes.len(),
        lines.join("\n")
    )
}

pub fn progress(summary: &ScanSummary) -> String {
    format!(
        "📊 Progress: {}/{} pairs processed. Found {} valid pairs so far.",
        summary.processed,
        summary.total,
        summary.matched_count()
    )
}

pub fn scan_complete(summary: &ScanSummary) -> String {
    if summary.matched_count() > 0 {
        format!(
            "🔥 Analysis complete! Found {} qualifying pairs.",
            summary.matched_count()
        )
    } else {
        "❌ No valid pairs found.".to_string()
    }
}
