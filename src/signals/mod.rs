// Signal library: stateless pattern checks over candle / VWAP / ATR snapshots
pub mod retest;
pub mod reversal;
pub mod targets;
pub mod zones;

pub use retest::{
    first_pullback_status, has_lost_key_level, has_reclaimed_vwap, has_retested_level, scan_waves, PullbackInfo,
    PullbackStatus, WaveScan,
};
pub use reversal::{is_reversal_bar, last_reversal_bar};
pub use targets::{minimum_profit_target, target_prices};
pub use zones::{is_with_vwap, is_worse_than_vwap, zone_score};
