use crate::config::LiquidityTier;
use crate::models::Candle;

/// Size multiplier from traded dollar volume since open: the highest tier
/// whose threshold is met. No tier met, or no tiers at all, gives 0.
pub fn liquidity_scale(dollar_volume: f64, tiers: &[LiquidityTier]) -> f64 {
    tiers
        .iter()
        .filter(|tier| dollar_volume >= tier.min_dollar_volume)
        .max_by(|a, b| a.min_dollar_volume.total_cmp(&b.min_dollar_volume))
        .map(|tier| tier.scale.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Cumulative volume from the session's peak-volume bar to the last closed
/// bar reaches `min_shares`. Fails closed without candles.
pub fn minimum_volume_met(candles: &[Candle], min_shares: f64) -> bool {
    // Earliest bar carrying the session's peak volume
    let Some((peak, _)) = candles
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, c)| match best {
            Some((_, volume)) if volume >= c.volume => best,
            _ => Some((i, c.volume)),
        })
    else {
        return false;
    };

    candles[peak..].iter().map(|c| c.volume).sum::<f64>() >= min_shares
}

/// Spread wider than `max_ratio` of the daily ATR
pub fn spread_too_wide(spread: f64, atr_average: f64, max_ratio: f64) -> bool {
    spread > max_ratio * atr_average
}
