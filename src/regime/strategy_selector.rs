/// Strategy selection from the session ordering
///
/// Each ordering enables a fixed set of tradebook variants per direction.
/// Everything else is switched off, except variants enabled by default.
use super::detector::SessionOrdering;
use crate::models::{Direction, StrategyKind};
use crate::strategy::{variant_spec, Tradebook};

use StrategyKind::*;

/// Variants the ordering enables for `direction`
pub fn enabled_kinds(ordering: SessionOrdering, direction: Direction) -> &'static [StrategyKind] {
    match (ordering, direction) {
        (SessionOrdering::OpenKeyVwap, Direction::Long) => &[OpenDrive, GapAndGo, VwapContinuation],
        (SessionOrdering::OpenKeyVwap, Direction::Short) => &[Reversal],

        (SessionOrdering::KeyOpenVwap, Direction::Long) => &[AboveWaterBreakout],
        (SessionOrdering::KeyOpenVwap, Direction::Short) => &[VwapContinuationFailed],

        (SessionOrdering::KeyVwapOpen, Direction::Long) => &[OpenFlush],
        (SessionOrdering::KeyVwapOpen, Direction::Short) => &[OpenDrive, VwapContinuation],

        (SessionOrdering::OpenVwapKey, Direction::Long) => &[OpenDrive, VwapContinuation],
        (SessionOrdering::OpenVwapKey, Direction::Short) => &[VwapContinuationFailed],

        (SessionOrdering::VwapOpenKey, Direction::Long) => &[VwapContinuationFailed],
        (SessionOrdering::VwapOpenKey, Direction::Short) => &[BelowWaterBreakdown],

        (SessionOrdering::VwapKeyOpen, Direction::Long) => &[Reversal],
        (SessionOrdering::VwapKeyOpen, Direction::Short) => &[OpenDrive, GapAndGo, VwapContinuation],

        (SessionOrdering::KeyAtVwap, Direction::Long) => &[AboveWaterBreakout, VwapContinuation],
        (SessionOrdering::KeyAtVwap, Direction::Short) => &[BelowWaterBreakdown, VwapContinuation],
    }
}

/// Whether a tradebook should run under `ordering`. With no ordering yet
/// only default-enabled variants run.
pub fn should_enable(ordering: Option<SessionOrdering>, direction: Direction, kind: StrategyKind) -> bool {
    if variant_spec(kind).enable_by_default {
        return true;
    }
    ordering.is_some_and(|o| enabled_kinds(o, direction).contains(&kind))
}

pub struct StrategySelector;

impl StrategySelector {
    /// Enable/disable every tradebook of one symbol. Returns the number of
    /// tradebooks that ended up enabled.
    pub fn apply(ordering: Option<SessionOrdering>, tradebooks: &mut [Tradebook]) -> usize {
        let mut enabled = 0;
        for book in tradebooks.iter_mut() {
            let on = should_enable(ordering, book.direction, book.kind);
            book.set_enabled(on);
            if book.is_enabled() {
                enabled += 1;
            }
        }

        match ordering {
            Some(o) => tracing::info!("Strategy selection for {}: {} tradebook(s) enabled", o, enabled),
            None => tracing::info!("No ordering yet, {} default tradebook(s) enabled", enabled),
        }
        enabled
    }
}
