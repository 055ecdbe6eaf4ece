use super::PatternConfig;
use crate::models::{Candle, ReferenceGroup};

/// Why a series does or does not carry the consolidation tail
#[derive(Debug, Clone, PartialEq)]
pub enum TailVerdict {
    NoGroup,
    ShortTail { remaining: usize, required: usize },
    AboveReferenceHigh { index: usize, high: f64 },
    BelowRetracementFloor { index: usize, low: f64, floor: f64 },
    WeakRecovery { last_high: f64, required: f64 },
    Confirmed,
}

impl TailVerdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TailVerdict::Confirmed)
    }
}

/// Check the candles after the reference group
///
/// Every tail candle must stay at or below the group high and at or above the
/// retracement floor, and the last candle must recover to `recovery_ratio` of
/// the group high. The first violation in series order is reported.
pub fn check_tail(
    group: Option<&ReferenceGroup>,
    candles: &[Candle],
    config: &PatternConfig,
) -> TailVerdict {
    let Some(group) = group else {
        return TailVerdict::NoGroup;
    };

    let tail_start = group.tail_start();
    let tail = candles.get(tail_start..).unwrap_or_default();
    if tail.len() < config.min_tail_candles {
        return TailVerdict::ShortTail {
            remaining: tail.len(),
            required: config.min_tail_candles,
        };
    }

    let floor = group.retracement_floor(config.max_retracement);
    for (offset, candle) in tail.iter().enumerate() {
        if candle.high > group.max_high {
            return TailVerdict::AboveReferenceHigh {
                index: tail_start + offset,
                high: candle.high,
            };
        }
        if candle.low < floor {
            return TailVerdict::BelowRetracementFloor {
                index: tail_start + offset,
                low: candle.low,
                floor,
            };
        }
    }

    // Measured against the group high, not the tail's own extremes
    let required = group.max_high * config.recovery_ratio;
    match tail.last() {
        Some(last) if last.high >= required => TailVerdict::Confirmed,
        Some(last) => TailVerdict::WeakRecovery {
            last_high: last.high,
            required,
        },
        None => TailVerdict::ShortTail {
            remaining: 0,
            required: config.min_tail_candles,
        },
    }
}

pub fn validate_tail(
    group: Option<&ReferenceGroup>,
    candles: &[Candle],
    config: &PatternConfig,
) -> bool {
    check_tail(group, candles, config).is_confirmed()
}
