// Ascending-group / consolidation pattern
pub mod reference_group;
pub mod validator;

pub use reference_group::find_reference_group;
pub use validator::{check_tail, validate_tail, TailVerdict};

use crate::config::ConfigError;
use crate::models::Candle;
use serde::{Deserialize, Serialize};

/// Tunable parameters of the pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub max_retracement: f64, // Fraction of the group range the tail may give back
    pub recovery_ratio: f64,  // Last high vs group high
    pub min_tail_candles: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_group_size: 1,
            max_group_size: 3,
            max_retracement: 0.5, // Midpoint of the group
            recovery_ratio: 0.9,
            min_tail_candles: 3,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_group_size == 0 || self.min_group_size > self.max_group_size {
            return Err(ConfigError::InvalidGroupSize {
                min: self.min_group_size,
                max: self.max_group_size,
            });
        }
        if !(0.0..=1.0).contains(&self.max_retracement) {
            return Err(ConfigError::OutOfRange {
                field: "pattern.max_retracement",
                value: self.max_retracement,
            });
        }
        if !(self.recovery_ratio > 0.0 && self.recovery_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "pattern.recovery_ratio",
                value: self.recovery_ratio,
            });
        }
        if self.min_tail_candles == 0 {
            return Err(ConfigError::Invalid(
                "pattern.min_tail_candles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run the detector and the tail check over one series
pub fn evaluate(candles: &[Candle], config: &PatternConfig) -> TailVerdict {
    let group = find_reference_group(candles, config);
    check_tail(group.as_ref(), candles, config)
}

/// True when the series carries the full pattern
pub fn is_match(candles: &[Candle], config: &PatternConfig) -> bool {
    evaluate(candles, config).is_confirmed()
}
