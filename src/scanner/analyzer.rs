use crate::api::MarketDataSource;
use crate::models::{Candle, MatchResult, RawCandle};
use crate::notify::{messages, Notifier};
use crate::pattern::{self, PatternConfig, TailVerdict};
use std::sync::Arc;

/// Runs the pattern against one (symbol, timeframe) series
pub struct TimeframeAnalyzer {
    market_data: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn Notifier>,
    pattern: PatternConfig,
    candle_limit: usize,
}

impl TimeframeAnalyzer {
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        notifier: Arc<dyn Notifier>,
        pattern: PatternConfig,
        candle_limit: usize,
    ) -> Self {
        Self {
            market_data,
            notifier,
            pattern,
            candle_limit,
        }
    }

    pub fn candle_limit(&self) -> usize {
        self.candle_limit
    }

    /// Fetch, detect and validate; alerts immediately on a match
    ///
    /// Fetch failures and short series are a plain no-match.
    pub async fn analyze(&self, symbol: &str, timeframe: &str) -> MatchResult {
        let matched = match self
            .market_data
            .fetch_candles(symbol, timeframe, self.candle_limit)
            .await
        {
            Ok(records) => self.evaluate(symbol, timeframe, &records),
            Err(e) => {
                tracing::warn!("Error analyzing {} on {}: {}", symbol, timeframe, e);
                false
            }
        };

        if matched {
            tracing::info!(symbol, timeframe, "✅ Pattern match");
            self.notifier
                .send(&messages::match_alert(symbol, timeframe))
                .await;
        }

        MatchResult {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            matched,
        }
    }

    fn evaluate(&self, symbol: &str, timeframe: &str, records: &[RawCandle]) -> bool {
        if records.len() < self.candle_limit {
            tracing::debug!(
                symbol,
                timeframe,
                "Insufficient data: {}/{} candles",
                records.len(),
                self.candle_limit
            );
            return false;
        }

        let candles: Vec<Candle> = records.iter().map(|r| Candle::from_raw(r)).collect();
        let verdict = pattern::evaluate(&candles, &self.pattern);
        if !matches!(verdict, TailVerdict::Confirmed | TailVerdict::NoGroup) {
            tracing::debug!(symbol, timeframe, ?verdict, "Rejected");
        }
        verdict.is_confirmed()
    }
}
