pub mod orders;
pub mod plan;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use orders::{
    AccountSnapshot, CheckRulesResult, EntryInstruction, ExitAction, ExitPair, OrderType, PositionSnapshot,
};
pub use plan::{BasePlan, DirectionalPlan, ExitTargetSet, SetupQuality, TradingPlan};

/// One-minute (or aggregated) OHLCV candle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    pub fn top_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn bottom_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Extreme in the direction of the trade (high for longs, low for shorts)
    pub fn favorable_extreme(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.high,
            Direction::Short => self.low,
        }
    }

    /// Extreme against the trade (low for longs, high for shorts)
    pub fn adverse_extreme(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.low,
            Direction::Short => self.high,
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn is_long(&self) -> bool {
        matches!(self, Direction::Long)
    }

    /// +1.0 for longs, -1.0 for shorts
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// True when `a` is strictly beyond `b` in this direction
    /// (above for longs, below for shorts).
    pub fn is_favorable(&self, a: f64, b: f64) -> bool {
        match self {
            Direction::Long => a > b,
            Direction::Short => a < b,
        }
    }

    /// Pick the more favorable of two prices
    pub fn better(&self, a: f64, b: f64) -> f64 {
        if self.is_favorable(a, b) {
            a
        } else {
            b
        }
    }

    /// Pick the less favorable of two prices
    pub fn worse(&self, a: f64, b: f64) -> f64 {
        if self.is_favorable(a, b) {
            b
        } else {
            a
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Price band anchoring momentum. `high == low` for a single pivot price.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct KeyLevel {
    pub high: f64,
    pub low: f64,
}

impl KeyLevel {
    pub fn new(high: f64, low: f64) -> Self {
        if high >= low {
            Self { high, low }
        } else {
            Self { high: low, low: high }
        }
    }

    pub fn single(price: f64) -> Self {
        Self {
            high: price,
            low: price,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }

    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Edge of the band a trade in `direction` must hold (low for longs)
    pub fn support(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.low,
            Direction::Short => self.high,
        }
    }

    /// Edge of the band a trade in `direction` breaks through (high for longs)
    pub fn breakout(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.high,
            Direction::Short => self.low,
        }
    }
}

impl<'de> Deserialize<'de> for KeyLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            high: f64,
            low: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(KeyLevel::new(raw.high, raw.low))
    }
}

/// Daily ATR baseline and the multipliers derived targets/buffers use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AtrInfo {
    pub average: f64,
    #[serde(default = "default_max_multiplier")]
    pub maximum_multiplier: f64,
    #[serde(default = "default_min_multiplier")]
    pub minimum_multiplier: f64,
}

fn default_max_multiplier() -> f64 {
    1.5
}

fn default_min_multiplier() -> f64 {
    0.5
}

impl AtrInfo {
    pub fn new(average: f64) -> Self {
        Self {
            average,
            maximum_multiplier: default_max_multiplier(),
            minimum_multiplier: default_min_multiplier(),
        }
    }

    pub fn minimum(&self) -> f64 {
        self.average * self.minimum_multiplier
    }

    pub fn maximum(&self) -> f64 {
        self.average * self.maximum_multiplier
    }
}

/// Closed set of tradebook variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    AboveWaterBreakout,
    BelowWaterBreakdown,
    VwapContinuation,
    VwapContinuationFailed,
    OpenDrive,
    OpenFlush,
    Reversal,
    GapAndGo,
    GapReversal,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 9] = [
        StrategyKind::AboveWaterBreakout,
        StrategyKind::BelowWaterBreakdown,
        StrategyKind::VwapContinuation,
        StrategyKind::VwapContinuationFailed,
        StrategyKind::OpenDrive,
        StrategyKind::OpenFlush,
        StrategyKind::Reversal,
        StrategyKind::GapAndGo,
        StrategyKind::GapReversal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::AboveWaterBreakout => "AboveWaterBreakout",
            StrategyKind::BelowWaterBreakdown => "BelowWaterBreakdown",
            StrategyKind::VwapContinuation => "VwapContinuation",
            StrategyKind::VwapContinuationFailed => "VwapContinuationFailed",
            StrategyKind::OpenDrive => "OpenDrive",
            StrategyKind::OpenFlush => "OpenFlush",
            StrategyKind::Reversal => "Reversal",
            StrategyKind::GapAndGo => "GapAndGo",
            StrategyKind::GapReversal => "GapReversal",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
