use crate::models::SetupQuality;

/// Risk sizing for the next entry: the setup quality factor, halved when the
/// entry adds to an existing position.
pub fn risk_sizing_for_next_entry(quality: SetupQuality, adding: bool) -> f64 {
    let factor = quality.size_factor();
    if adding {
        factor * 0.5
    } else {
        factor
    }
}
