use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::{MarketDataProvider, MarketSnapshot};
use crate::indicators::VwapAccumulator;
use crate::models::{AccountSnapshot, AtrInfo, Candle, PositionSnapshot};

#[derive(Debug, Clone)]
struct SymbolFeed {
    market_open: DateTime<Utc>,
    atr: AtrInfo,
    premarket_vwap: VwapAccumulator,
    premarket_high: Option<f64>,
    premarket_low: Option<f64>,
    candles: Vec<Candle>,
    vwap: VwapAccumulator,
    vwaps: Vec<f64>,
    current: Option<Candle>,
    price: f64,
    spread: f64,
    now: DateTime<Utc>,
}

/// In-memory market state for every watched symbol
///
/// Single writer: candles and ticks are appended synchronously from the event
/// loop, snapshots are cloned out for the decision engine.
#[derive(Debug, Clone, Default)]
pub struct MarketStore {
    feeds: HashMap<String, SymbolFeed>,
    account: AccountSnapshot,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a symbol for the session
    pub fn open_session(&mut self, symbol: &str, market_open: DateTime<Utc>, atr: AtrInfo) {
        self.feeds.insert(
            symbol.to_string(),
            SymbolFeed {
                market_open,
                atr,
                premarket_vwap: VwapAccumulator::new(),
                premarket_high: None,
                premarket_low: None,
                candles: Vec::new(),
                vwap: VwapAccumulator::new(),
                vwaps: Vec::new(),
                current: None,
                price: 0.0,
                spread: 0.0,
                now: market_open,
            },
        );
    }

    /// Add a candle for a symbol
    ///
    /// Candles stamped before the open feed the premarket range and the
    /// pre-open VWAP, later ones are closed session candles.
    pub fn add_candle(&mut self, candle: Candle) -> bool {
        let Some(feed) = self.feeds.get_mut(&candle.symbol) else {
            tracing::warn!("[{}] candle for untracked symbol dropped", candle.symbol);
            return false;
        };

        let closed_at = candle.timestamp + Duration::minutes(1);
        if candle.timestamp < feed.market_open {
            feed.premarket_vwap.push(&candle);
            feed.premarket_high = Some(feed.premarket_high.map_or(candle.high, |h| h.max(candle.high)));
            feed.premarket_low = Some(feed.premarket_low.map_or(candle.low, |l| l.min(candle.low)));
        } else {
            let vwap = feed.vwap.push(&candle);
            feed.vwaps.push(vwap);
            feed.candles.push(candle.clone());
            feed.current = None;
        }

        feed.price = candle.close;
        feed.now = feed.now.max(closed_at);
        true
    }

    /// Apply a trade print to the forming candle
    pub fn update_tick(&mut self, symbol: &str, time: DateTime<Utc>, price: f64, volume: f64, spread: f64) {
        let Some(feed) = self.feeds.get_mut(symbol) else {
            return;
        };

        match feed.current.as_mut() {
            Some(current) => {
                current.high = current.high.max(price);
                current.low = current.low.min(price);
                current.close = price;
                current.volume += volume;
            }
            None => {
                feed.current = Some(Candle {
                    symbol: symbol.to_string(),
                    timestamp: time,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                });
            }
        }

        feed.price = price;
        feed.spread = spread;
        feed.now = feed.now.max(time);
    }

    pub fn set_time(&mut self, symbol: &str, now: DateTime<Utc>) {
        if let Some(feed) = self.feeds.get_mut(symbol) {
            feed.now = now;
        }
    }

    pub fn candle_count(&self, symbol: &str) -> usize {
        self.feeds.get(symbol).map(|f| f.candles.len()).unwrap_or(0)
    }

    pub fn set_position(&mut self, position: PositionSnapshot) {
        self.account
            .positions
            .insert(position.symbol.clone(), position);
    }

    pub fn account_mut(&mut self) -> &mut AccountSnapshot {
        &mut self.account
    }
}

impl MarketDataProvider for MarketStore {
    fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        let feed = self.feeds.get(symbol)?;
        Some(MarketSnapshot {
            symbol: symbol.to_string(),
            now: feed.now,
            market_open: feed.market_open,
            candles: feed.candles.clone(),
            current: feed.current.clone(),
            vwaps: feed.vwaps.clone(),
            current_vwap: feed.current.as_ref().map(|c| feed.vwap.peek(c)),
            vwap_before_open: feed.premarket_vwap.value(),
            premarket_high: feed.premarket_high,
            premarket_low: feed.premarket_low,
            price: feed.price,
            spread: feed.spread,
            atr: feed.atr,
        })
    }

    fn account(&self) -> AccountSnapshot {
        self.account.clone()
    }
}
