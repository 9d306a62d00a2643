// Market data contract consumed by the decision engine
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::aggregate_closed;
use crate::models::{AccountSnapshot, AtrInfo, Candle};

pub use store::MarketStore;

/// Read-only view of one symbol's session at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub now: DateTime<Utc>,
    pub market_open: DateTime<Utc>,
    /// Closed one-minute candles since open
    pub candles: Vec<Candle>,
    /// Forming candle, if any ticks arrived since the last close
    pub current: Option<Candle>,
    /// VWAP aligned by index with `candles`
    pub vwaps: Vec<f64>,
    pub current_vwap: Option<f64>,
    pub vwap_before_open: Option<f64>,
    pub premarket_high: Option<f64>,
    pub premarket_low: Option<f64>,
    pub price: f64,
    pub spread: f64,
    pub atr: AtrInfo,
}

impl MarketSnapshot {
    pub fn minutes_since_open(&self) -> f64 {
        (self.now - self.market_open).num_milliseconds() as f64 / 60_000.0
    }

    pub fn is_market_open(&self) -> bool {
        self.now >= self.market_open
    }

    pub fn open_price(&self) -> Option<f64> {
        self.candles
            .first()
            .or(self.current.as_ref())
            .map(|c| c.open)
    }

    pub fn last_closed(&self) -> Option<&Candle> {
        self.candles.last()
    }

    fn all_candles(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter().chain(self.current.iter())
    }

    pub fn high_of_day(&self) -> Option<f64> {
        self.all_candles().map(|c| c.high).reduce(f64::max)
    }

    pub fn low_of_day(&self) -> Option<f64> {
        self.all_candles().map(|c| c.low).reduce(f64::min)
    }

    /// Closed `minutes`-wide candles since open
    pub fn aggregated(&self, minutes: i64) -> Vec<Candle> {
        aggregate_closed(&self.candles, self.market_open, minutes)
    }

    pub fn dollar_volume_since_open(&self) -> f64 {
        self.all_candles()
            .map(|c| c.volume * (c.high + c.low + c.close) / 3.0)
            .sum()
    }

    pub fn latest_vwap(&self) -> Option<f64> {
        self.current_vwap.or_else(|| self.vwaps.last().copied())
    }
}

/// Source of market snapshots and account state
pub trait MarketDataProvider {
    fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot>;

    fn account(&self) -> AccountSnapshot;
}
