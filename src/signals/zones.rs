use crate::models::{Direction, KeyLevel};

/// Where the open sits relative to the key level and pre-open VWAP.
///
/// +1 when the open is at/above the key-level high and that high is above
/// VWAP, or the open clears both outright. -1 for the mirrored case using the
/// key-level low. 0 otherwise.
pub fn zone_score(open: f64, vwap_before_open: f64, key_level: &KeyLevel) -> i8 {
    let above = (open >= key_level.high && key_level.high > vwap_before_open)
        || (open > key_level.high && open > vwap_before_open);
    if above {
        return 1;
    }

    let below = (open <= key_level.low && key_level.low < vwap_before_open)
        || (open < key_level.low && open < vwap_before_open);
    if below {
        return -1;
    }

    0
}

/// True when `price` sits on the trade-favourable side of `vwap`
pub fn is_with_vwap(direction: Direction, price: f64, vwap: f64) -> bool {
    direction.is_favorable(price, vwap)
}

/// True when `price` is strictly worse than `vwap` for the trade
pub fn is_worse_than_vwap(direction: Direction, price: f64, vwap: f64) -> bool {
    direction.is_favorable(vwap, price)
}
