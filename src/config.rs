use crate::api::MAX_KLINES_LIMIT;
use crate::pattern::PatternConfig;
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SCANNER";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error("at least one timeframe must be configured")]
    NoTimeframes,

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: u64,
        value: u64,
    },

    #[error("invalid group size bounds: min {min}, max {max}")]
    InvalidGroupSize { min: usize, max: usize },

    #[error("{field} = {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("missing Telegram credentials: set BOT_TOKEN and CHAT_ID (or use --dry-run)")]
    MissingCredentials,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scanner settings, read once at startup
///
/// Sources, lowest priority first: defaults, optional config file,
/// `SCANNER_*` environment variables (`SCANNER_PATTERN__RECOVERY_RATIO=0.85`,
/// `SCANNER_TIMEFRAMES=15m,1h`). Credentials also fall back to the plain
/// `BOT_TOKEN` / `CHAT_ID` variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bot_token: String,
    pub chat_id: String,
    pub timeframes: Vec<String>,
    pub max_workers: usize,
    pub request_delay_ms: u64,
    pub candle_limit: usize, // Candles fetched per timeframe
    pub progress_interval: usize,
    pub quote_asset: String,
    pub binance_api_url: String,
    pub telegram_api_url: String,
    pub http_timeout_secs: u64,
    pub max_requests_per_minute: u32,
    pub notify_attempts: u32,
    pub notify_backoff_secs: u64,
    pub pattern: PatternConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            timeframes: ["15m", "30m", "1h", "2h", "4h", "8h", "1d", "1w"]
                .iter()
                .map(|tf| tf.to_string())
                .collect(),
            max_workers: 8,
            request_delay_ms: 500,
            candle_limit: 50,
            progress_interval: 100,
            quote_asset: "USDT".to_string(),
            binance_api_url: "https://api.binance.com".to_string(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            http_timeout_secs: 10,
            max_requests_per_minute: 1000, // Binance allows 6000 weight/min, klines cost 2
            notify_attempts: 3,
            notify_backoff_secs: 2,
            pattern: PatternConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("bot_token", std::env::var("BOT_TOKEN").unwrap_or_default())?
            .set_default("chat_id", std::env::var("CHAT_ID").unwrap_or_default())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("timeframes"),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already-built config
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeframes.iter().all(|tf| tf.trim().is_empty()) {
            return Err(ConfigError::NoTimeframes);
        }
        check_min("max_workers", self.max_workers as u64, 1)?;
        check_min("candle_limit", self.candle_limit as u64, 4)?;
        check_max("candle_limit", self.candle_limit as u64, MAX_KLINES_LIMIT as u64)?;
        check_min("progress_interval", self.progress_interval as u64, 1)?;
        check_min(
            "max_requests_per_minute",
            self.max_requests_per_minute as u64,
            1,
        )?;
        check_min("notify_attempts", self.notify_attempts as u64, 1)?;
        self.pattern.validate()
    }

    /// Bot token and chat id, required unless running dry
    pub fn telegram_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let token = self.bot_token.trim();
        let chat_id = self.chat_id.trim();
        if token.is_empty() || chat_id.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok((token, chat_id))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn notify_backoff(&self) -> Duration {
        Duration::from_secs(self.notify_backoff_secs)
    }
}

fn check_min(field: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, min, value });
    }
    Ok(())
}

fn check_max(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::TooLarge { field, max, value });
    }
    Ok(())
}
