use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tradebook state. The momentum machine runs
/// Observing -> Momentum <-> Pullback -> Failed; the VWAP machine runs
/// Observing -> LostVwap -> {Bounce <-> LegDown} -> ReclaimedVwap.
///
/// VWAP state names read from the short side, where the trade starts when
/// price loses VWAP. A long book mirrors every one of them:
///
/// | state           | short                         | long                          |
/// |-----------------|-------------------------------|-------------------------------|
/// | `LostVwap`      | close crosses below VWAP      | close crosses above VWAP      |
/// | `LegDown`       | new low beyond the last bar   | new high beyond the last bar  |
/// | `Bounce`        | bar without a new low         | bar without a new high        |
/// | `ReclaimedVwap` | close back above VWAP         | close back below VWAP         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradebookState {
    Observing,
    Momentum,
    Pullback,
    Failed,
    /// Price crossed VWAP in the trade's direction
    LostVwap,
    Bounce,
    /// New extreme in the trade's direction
    LegDown,
    /// Price crossed back through VWAP against the trade
    ReclaimedVwap,
}

impl TradebookState {
    /// Terminal states fall back to Observing once the position is flat
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradebookState::Failed | TradebookState::ReclaimedVwap)
    }

    /// Entering this state starts a new momentum leg
    pub fn starts_leg(&self) -> bool {
        matches!(self, TradebookState::Momentum | TradebookState::LegDown)
    }
}

impl std::fmt::Display for TradebookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradebookState::Observing => write!(f, "OBSERVING"),
            TradebookState::Momentum => write!(f, "MOMENTUM"),
            TradebookState::Pullback => write!(f, "PULLBACK"),
            TradebookState::Failed => write!(f, "FAILED"),
            TradebookState::LostVwap => write!(f, "LOST_VWAP"),
            TradebookState::Bounce => write!(f, "BOUNCE"),
            TradebookState::LegDown => write!(f, "LEG_DOWN"),
            TradebookState::ReclaimedVwap => write!(f, "RECLAIMED_VWAP"),
        }
    }
}

/// A state change, reported to the caller for bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub tradebook_id: String,
    pub from: TradebookState,
    pub to: TradebookState,
    pub timestamp: DateTime<Utc>,
}
