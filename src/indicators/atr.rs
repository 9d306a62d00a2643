/// Average True Range (ATR) baseline
///
/// The engine sizes targets and buffers off a *daily* ATR: the average of true
/// ranges over recent daily candles. True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing for the moving average.

use crate::models::{AtrInfo, Candle};

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|pair| {
            let (prev, bar) = (&pair[0], &pair[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect()
}

/// Calculate ATR for the given daily candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let true_ranges = true_ranges(candles);

    // First ATR is simple average of first 'period' true ranges
    let first_atr: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;

    let atr = true_ranges[period..]
        .iter()
        .fold(first_atr, |atr, tr| (atr * (period as f64 - 1.0) + tr) / period as f64);

    Some(atr)
}

/// Build the session ATR baseline from daily candles
pub fn atr_info_from_daily(candles: &[Candle], period: usize) -> Option<AtrInfo> {
    let average = calculate_atr(candles, period)?;
    if average <= 0.0 {
        return None;
    }
    Some(AtrInfo::new(average))
}

/// Fraction of the daily ATR already covered by today's range
pub fn atr_range_used(high_of_day: f64, low_of_day: f64, atr: &AtrInfo) -> f64 {
    if atr.average <= 0.0 {
        return 0.0;
    }
    (high_of_day - low_of_day).max(0.0) / atr.average
}
