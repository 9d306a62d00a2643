// Technical indicators module
// VWAP, timeframe aggregation and the daily ATR baseline

pub mod aggregate;
pub mod atr;
pub mod vwap;

pub use aggregate::aggregate_closed;
pub use atr::{atr_info_from_daily, atr_range_used, calculate_atr};
pub use vwap::{vwap_series, VwapAccumulator};
