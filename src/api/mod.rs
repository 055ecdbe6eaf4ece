pub mod binance;

pub use binance::{BinanceClient, BinanceOptions, MAX_KLINES_LIMIT};

use crate::models::RawCandle;
use crate::Result;
use async_trait::async_trait;

/// Errors from the HTTP collaborators
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error ({status}): {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid rate limit: {0} requests per minute")]
    InvalidRateLimit(u32),
}

/// Source of the symbols to scan
#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// Tradable symbols in exchange order; empty on any failure
    async fn list_tradable_symbols(&self) -> Vec<String>;
}

/// Source of raw kline records
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<RawCandle>>;
}

/// Fixed symbol list, for scans restricted on the command line
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols(pub Vec<String>);

#[async_trait]
impl SymbolSource for StaticSymbols {
    async fn list_tradable_symbols(&self) -> Vec<String> {
        self.0.clone()
    }
}
