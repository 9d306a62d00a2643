// Risk management module
// Each rule is an independent check; the admission pipeline combines them.
pub mod areas;
pub mod circuit_breakers;
pub mod liquidity;
pub mod sizing;
pub mod stops;
pub mod timing;
pub mod vwap;

pub use areas::{entry_too_far, in_no_trade_zone, near_against_watch_level, outside_tradable_areas};
pub use circuit_breakers::{CircuitBreakerTrip, CircuitBreakers};
pub use liquidity::{liquidity_scale, minimum_volume_met, spread_too_wide};
pub use sizing::risk_sizing_for_next_entry;
pub use stops::{added_position_eligibility, stop_is_valid, tighten_stop_check};
pub use timing::{blocked_by_timing, mid_range_cap};
pub use vwap::{near_against_vwap, vwap_distance_veto};
