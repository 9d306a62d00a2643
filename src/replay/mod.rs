// Replays a one-minute session through the engine
pub mod synthetic;

use chrono::{DateTime, Duration, Utc};

use crate::execution::OrderGateway;
use crate::market::MarketStore;
use crate::models::{AtrInfo, Candle, KeyLevel, TradingPlan};
use crate::session::Session;
use crate::strategy::{AdvisorySink, StateTransition};
use crate::Result;

pub use synthetic::{SessionScenario, SyntheticSessionGenerator};

/// Outcome of one replay
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub session_candles: usize,
    pub transitions: Vec<StateTransition>,
    /// Size admitted by scheduled rechecks
    pub recheck_size: f64,
}

/// Feeds candles one at a time into a session, the way a live data feed
/// would: close the candle, then run the rechecks that fall due before the
/// next candle's first print.
pub struct ReplayRunner {
    store: MarketStore,
    symbol: String,
    spread: f64,
}

impl ReplayRunner {
    pub fn new(symbol: &str, market_open: DateTime<Utc>, atr: AtrInfo) -> Self {
        let mut store = MarketStore::new();
        store.open_session(symbol, market_open, atr);
        Self {
            store,
            symbol: symbol.to_string(),
            spread: 0.01,
        }
    }

    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    pub fn run<G: OrderGateway, A: AdvisorySink>(
        &mut self,
        session: &mut Session<G, A>,
        candles: &[Candle],
    ) -> Result<ReplayReport> {
        if candles.is_empty() {
            return Err(format!("No candles to replay for {}", self.symbol).into());
        }

        tracing::info!("[{}] replaying {} candles", self.symbol, candles.len());
        let mut report = ReplayReport::default();

        for (i, candle) in candles.iter().enumerate() {
            if !self.store.add_candle(candle.clone()) {
                continue;
            }
            if self.store.candle_count(&self.symbol) == 0 {
                // Premarket
                continue;
            }
            report.session_candles += 1;
            report
                .transitions
                .extend(session.on_candle_closed(&self.symbol, &self.store));

            // First print of the next candle, then anything due before it
            let Some(next) = candles.get(i + 1) else {
                continue;
            };
            let print_at = next.timestamp + Duration::milliseconds(500);
            self.store
                .update_tick(&self.symbol, next.timestamp, next.open, 0.0, self.spread);
            while let Some(due) = session.scheduler().next_due() {
                if due > print_at {
                    break;
                }
                self.store.set_time(&self.symbol, due);
                report.recheck_size += session.on_tick(due, &self.store);
            }
        }

        tracing::info!(
            "[{}] replay done: {} session candles, {} state changes",
            self.symbol,
            report.session_candles,
            report.transitions.len()
        );
        Ok(report)
    }
}

/// Plan for a synthetic session around `base_price`: key level just above
/// the base, daily ATR of 3%
pub fn synthetic_plan(symbol: &str, base_price: f64) -> TradingPlan {
    TradingPlan::new(
        symbol,
        AtrInfo::new(base_price * 0.03),
        KeyLevel::new(base_price * 1.008, base_price * 1.004),
    )
}
