use chrono::{DateTime, Utc};

use crate::models::Candle;

/// Aggregate one-minute candles into `minutes`-wide candles anchored at
/// `anchor` (usually the market open). Only buckets that are complete,
/// i.e. hold all their one-minute candles' time span, are returned.
pub fn aggregate_closed(candles: &[Candle], anchor: DateTime<Utc>, minutes: i64) -> Vec<Candle> {
    if minutes <= 0 {
        return Vec::new();
    }
    if minutes == 1 {
        return candles.to_vec();
    }

    let mut buckets: Vec<(i64, Candle)> = Vec::new();
    for candle in candles {
        let offset = (candle.timestamp - anchor).num_minutes();
        if offset < 0 {
            continue;
        }
        let bucket = offset / minutes;

        match buckets.last_mut() {
            Some((idx, agg)) if *idx == bucket => {
                agg.high = agg.high.max(candle.high);
                agg.low = agg.low.min(candle.low);
                agg.close = candle.close;
                agg.volume += candle.volume;
            }
            _ => {
                let mut agg = candle.clone();
                agg.timestamp = anchor + chrono::Duration::minutes(bucket * minutes);
                buckets.push((bucket, agg));
            }
        }
    }

    // A bucket is complete once the one-minute candle covering its last minute is in
    let complete_through = candles
        .last()
        .map(|c| (c.timestamp - anchor).num_minutes() + 1)
        .unwrap_or(0);

    buckets
        .into_iter()
        .filter(|(idx, _)| (idx + 1) * minutes <= complete_through)
        .map(|(_, candle)| candle)
        .collect()
}
