use super::PatternConfig;
use crate::models::{Candle, ReferenceGroup};

/// Find the strongest ascending green run in a series
///
/// Single left-to-right pass. A run starts on a green candle and grows while
/// each next green candle prints a strictly higher high. A red/neutral candle
/// or a green candle without a higher high ends the run; that green candle
/// does not open a new run itself. Runs that grow past `max_group_size` are
/// dropped entirely.
///
/// Among eligible runs the highest `max_high` wins; on equal highs the
/// earlier one is kept.
pub fn find_reference_group(candles: &[Candle], config: &PatternConfig) -> Option<ReferenceGroup> {
    let eligible = config.min_group_size..=config.max_group_size;
    let mut best: Option<ReferenceGroup> = None;
    let mut current: Option<ReferenceGroup> = None;

    for (index, candle) in candles.iter().enumerate() {
        if !candle.is_green() {
            current = None;
            continue;
        }

        match current.as_mut() {
            None => current = Some(ReferenceGroup::starting_at(index, candle)),
            Some(run) if candle.high > run.max_high => run.extend(candle),
            Some(_) => {
                current = None;
                continue;
            }
        }

        let Some(run) = current else { continue };

        if eligible.contains(&run.size) {
            if best.map_or(true, |b| run.max_high > b.max_high) {
                best = Some(run);
            }
        } else if run.size > config.max_group_size {
            current = None;
        }
    }

    best
}
