use crate::models::{Direction, KeyLevel};

/// No-trade zone containing `price`
pub fn in_no_trade_zone(price: f64, zones: &[KeyLevel]) -> Option<KeyLevel> {
    zones.iter().find(|zone| zone.contains(price)).copied()
}

/// Tradable areas are configured and `price` is outside every one of them
pub fn outside_tradable_areas(price: f64, areas: &[KeyLevel]) -> bool {
    !areas.is_empty() && !areas.iter().any(|area| area.contains(price))
}

/// Nearest watch level ahead of the entry within `buffer`
pub fn near_against_watch_level(direction: Direction, price: f64, levels: &[f64], buffer: f64) -> Option<f64> {
    levels
        .iter()
        .copied()
        .filter(|level| direction.is_favorable(*level, price) && (level - price).abs() <= buffer)
        .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
}

/// Entry price more than `max_distance` away from the current price
pub fn entry_too_far(entry_price: f64, current_price: f64, max_distance: f64) -> bool {
    (entry_price - current_price).abs() > max_distance
}
