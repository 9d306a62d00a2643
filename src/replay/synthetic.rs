use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::Candle;

/// Shape of the synthetic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SessionScenario {
    /// Gap up over the premarket high, then a steady drive higher
    DriveUp,
    /// Opening flush of ~1.5% in the first five minutes, then a recovery
    Flush,
    /// Mean-reverting chop around the open
    Chop,
}

impl std::fmt::Display for SessionScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionScenario::DriveUp => write!(f, "drive-up"),
            SessionScenario::Flush => write!(f, "flush"),
            SessionScenario::Chop => write!(f, "chop"),
        }
    }
}

/// Generates seeded one-minute intraday sessions
pub struct SyntheticSessionGenerator {
    rng: StdRng,
    symbol: String,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticSessionGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64, symbol: &str, base_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: symbol.to_string(),
            base_price,
            base_volume: 150_000.0,
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Premarket candles followed by `minutes` session candles
    ///
    /// Premarket candles are stamped before `market_open` and trade thin
    /// around the base price; session candles start at the open.
    pub fn generate(
        &mut self,
        scenario: SessionScenario,
        market_open: DateTime<Utc>,
        premarket_minutes: usize,
        minutes: usize,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(premarket_minutes + minutes);
        let mut price = self.base_price;

        let premarket_start = market_open - Duration::minutes(premarket_minutes as i64);
        for i in 0..premarket_minutes {
            let timestamp = premarket_start + Duration::minutes(i as i64);
            let next = price * (1.0 + self.rng.gen_range(-0.0005..0.0005));
            candles.push(self.create_candle(price, next, timestamp, 0.1));
            price = next;
        }

        let open = match scenario {
            SessionScenario::DriveUp => self.base_price * 1.012,
            SessionScenario::Flush | SessionScenario::Chop => self.base_price,
        };
        price = open;

        for i in 0..minutes {
            let timestamp = market_open + Duration::minutes(i as i64);
            let (next, volume_factor) = match scenario {
                SessionScenario::DriveUp => {
                    let drift = price * 0.0015;
                    let noise = price * self.rng.gen_range(-0.001..0.001);
                    let factor = if i < 15 { 2.0 } else { 1.0 };
                    (price + drift + noise, factor)
                }
                SessionScenario::Flush => {
                    let step = if i < 5 { -0.003 } else { 0.0012 };
                    let noise = price * self.rng.gen_range(-0.0008..0.0008);
                    let factor = if i < 5 { 3.0 } else { 1.2 };
                    (price * (1.0 + step) + noise, factor)
                }
                SessionScenario::Chop => {
                    let reversion = (open - price) * 0.2;
                    let noise = price * self.rng.gen_range(-0.003..0.003);
                    (price + reversion + noise, 1.0)
                }
            };

            candles.push(self.create_candle(price, next, timestamp, volume_factor));
            price = next;
        }

        candles
    }

    /// `days` daily bars ending the day before `session_open`, drifting
    /// around the base price with a 2-4% daily range
    pub fn generate_daily(&mut self, days: usize, session_open: DateTime<Utc>) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(days);
        let mut close = self.base_price;

        for i in 0..days {
            let timestamp = session_open - Duration::days((days - i) as i64);
            let open = close * (1.0 + self.rng.gen_range(-0.01..0.01));
            let next = open * (1.0 + self.rng.gen_range(-0.015..0.015));
            let range = self.base_price * self.rng.gen_range(0.02..0.04);
            let body_high = open.max(next);
            let body_low = open.min(next);
            let slack = (range - (body_high - body_low)).max(0.0) / 2.0;

            candles.push(Candle {
                symbol: self.symbol.clone(),
                timestamp,
                open,
                high: body_high + slack,
                low: body_low - slack,
                close: next,
                volume: self.base_volume * 390.0 * self.rng.gen_range(0.7..1.3),
            });
            close = next;
        }

        candles
    }

    /// Candle opening at `open` and closing at `close`, with a little
    /// intrabar range beyond both
    fn create_candle(&mut self, open: f64, close: f64, timestamp: DateTime<Utc>, volume_factor: f64) -> Candle {
        let noise_pct = 0.0015;
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..noise_pct));

        // Vary volume ±30%
        let volume = self.base_volume * volume_factor * self.rng.gen_range(0.7..1.3);

        Candle {
            symbol: self.symbol.clone(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
