use super::{ApiError, MarketDataSource, SymbolSource};
use crate::models::RawCandle;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "Binance";

/// Most rows `/api/v3/klines` returns for one request
pub const MAX_KLINES_LIMIT: usize = 1000;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Connection settings for the Binance spot REST API
#[derive(Debug, Clone)]
pub struct BinanceOptions {
    pub base_url: String,
    pub quote_asset: String,
    pub timeout: Duration,
    pub requests_per_minute: u32,
}

impl Default for BinanceOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: "USDT".to_string(),
            timeout: Duration::from_secs(10),
            requests_per_minute: 1000,
        }
    }
}

/// Binance spot client: symbol discovery and klines
///
/// Cloneable; all clones share the same rate limiter, so the request budget
/// is global across scan workers.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    quote_asset: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

/// Response from /api/v3/exchangeInfo (only the fields we read)
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

impl BinanceClient {
    pub fn new(options: BinanceOptions) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(options.timeout).build()?;

        let per_minute = NonZeroU32::new(options.requests_per_minute)
            .ok_or(ApiError::InvalidRateLimit(options.requests_per_minute))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            quote_asset: options.quote_asset,
            rate_limiter,
        })
    }

    /// Rate-limited GET that fails on non-success status
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ApiError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                service: SERVICE,
                status,
                body,
            });
        }

        Ok(response)
    }

    /// Symbols quoted in the configured asset that are currently trading
    pub async fn fetch_symbols(&self) -> Result<Vec<String>, ApiError> {
        let info: ExchangeInfo = self.get("/api/v3/exchangeInfo", &[]).await?.json().await?;

        let symbols: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.symbol.ends_with(&self.quote_asset)
                    && s.status == "TRADING"
                    && s.quote_asset == self.quote_asset
            })
            .map(|s| s.symbol)
            .collect();

        tracing::debug!("Found {} {} pairs", symbols.len(), self.quote_asset);
        Ok(symbols)
    }

    /// Raw klines, oldest first
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<RawCandle>, ApiError> {
        let limit = limit.to_string();
        let rows: Vec<Value> = self
            .get(
                "/api/v3/klines",
                &[("symbol", symbol), ("interval", interval), ("limit", &limit)],
            )
            .await?
            .json()
            .await?;

        // Anything that is not an array becomes an empty record and
        // normalizes to the zero candle later
        Ok(rows
            .into_iter()
            .map(|row| match row {
                Value::Array(fields) => fields,
                _ => Vec::new(),
            })
            .collect())
    }
}

#[async_trait]
impl SymbolSource for BinanceClient {
    async fn list_tradable_symbols(&self) -> Vec<String> {
        match self.fetch_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::error!("Error fetching pairs: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> crate::Result<Vec<RawCandle>> {
        Ok(self.fetch_klines(symbol, timeframe, limit).await?)
    }
}
