// Session ordering and strategy selection
pub mod detector;
pub mod strategy_selector;

pub use detector::{detect_ordering, SessionOrdering};
pub use strategy_selector::{enabled_kinds, should_enable, StrategySelector};
