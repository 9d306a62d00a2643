use crate::models::Direction;
use crate::signals::is_worse_than_vwap;

const MIN_FAR_RATIO: f64 = 2.0;
const MAX_NEGLIGIBLE_RATIO: f64 = 0.25;

/// Entries against VWAP need the VWAP distance to be either a full 2R away
/// or negligible (<= 0.25R). Returns the veto reason when neither holds.
pub fn vwap_distance_veto(
    direction: Direction,
    entry_price: f64,
    stop_price: f64,
    vwap: f64,
) -> Option<String> {
    if !is_worse_than_vwap(direction, entry_price, vwap) {
        return None;
    }

    let risk = (entry_price - stop_price).abs();
    if risk <= 0.0 {
        return Some("zero risk entry against vwap".to_string());
    }

    let ratio = (vwap - entry_price).abs() / risk;
    if ratio >= MIN_FAR_RATIO || ratio <= MAX_NEGLIGIBLE_RATIO {
        return None;
    }

    Some(format!(
        "entry against vwap {:.2} at {:.2}R, needs >= {:.1}R or <= {:.2}R",
        vwap, ratio, MIN_FAR_RATIO, MAX_NEGLIGIBLE_RATIO
    ))
}

/// VWAP sits ahead of the entry, within `buffer`
pub fn near_against_vwap(direction: Direction, entry_price: f64, vwap: f64, buffer: f64) -> bool {
    direction.is_favorable(vwap, entry_price) && (vwap - entry_price).abs() <= buffer
}
