use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One kline record as returned by the exchange: positional fields
/// (open time, open, high, low, close, volume, ...), numbers or strings.
pub type RawCandle = Vec<Value>;

/// OHLC candlestick
///
/// `Candle::default()` is the zero candle that malformed records collapse to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// Parse a raw kline record, falling back to the zero candle
    ///
    /// Fields 1..=4 hold open/high/low/close. A missing, non-numeric or
    /// non-finite field anywhere in that range yields `Candle::default()`.
    pub fn from_raw(record: &[Value]) -> Self {
        Self::try_from_raw(record).unwrap_or_default()
    }

    fn try_from_raw(record: &[Value]) -> Option<Self> {
        Some(Self {
            open: numeric_field(record, 1)?,
            high: numeric_field(record, 2)?,
            low: numeric_field(record, 3)?,
            close: numeric_field(record, 4)?,
        })
    }

    /// Close strictly above open
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }
}

fn numeric_field(record: &[Value], index: usize) -> Option<f64> {
    let value = match record.get(index)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Ascending green run found by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceGroup {
    /// Index of the first candle of the run
    pub start_index: usize,
    pub size: usize,
    pub max_high: f64,
    pub min_low: f64,
}

impl ReferenceGroup {
    pub(crate) fn starting_at(index: usize, candle: &Candle) -> Self {
        Self {
            start_index: index,
            size: 1,
            max_high: candle.high,
            min_low: candle.low,
        }
    }

    pub(crate) fn extend(&mut self, candle: &Candle) {
        self.size += 1;
        self.max_high = candle.high;
        self.min_low = self.min_low.min(candle.low);
    }

    /// Index of the first candle after the run
    pub fn tail_start(&self) -> usize {
        self.start_index + self.size
    }

    /// Lowest price the tail may touch when at most `max_retracement`
    /// of the group range is given back (0.5 is the midpoint)
    pub fn retracement_floor(&self, max_retracement: f64) -> f64 {
        self.max_high * (1.0 - max_retracement) + self.min_low * max_retracement
    }
}

/// Outcome of one (symbol, timeframe) analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub symbol: String,
    pub timeframe: String,
    pub matched: bool,
}

/// Matching timeframes of one symbol, in configured order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolScanResult {
    pub symbol: String,
    pub matched_timeframes: Vec<String>,
}

impl SymbolScanResult {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            matched_timeframes: Vec::new(),
        }
    }

    pub fn has_matches(&self) -> bool {
        !self.matched_timeframes.is_empty()
    }
}

/// Run-wide accumulator, owned by the orchestrator's collecting loop
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub total: usize,
    pub processed: usize,
    /// Symbols whose task died before producing a result
    pub failed: usize,
    /// Matching symbols in completion order
    pub matched_symbols: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
            matched_symbols: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, result: &SymbolScanResult) {
        self.processed += 1;
        if result.has_matches() {
            self.matched_symbols.push(result.symbol.clone());
        }
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn matched_count(&self) -> usize {
        self.matched_symbols.len()
    }

    /// Progress is due every `interval` symbols and once more at the end
    pub fn progress_due(&self, interval: usize) -> bool {
        self.processed > 0
            && (self.processed == self.total || (interval > 0 && self.processed % interval == 0))
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}
