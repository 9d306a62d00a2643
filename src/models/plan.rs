use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AtrInfo, Direction, KeyLevel, StrategyKind};
use crate::error::EngineError;

/// Setup quality tag, drives risk sizing for the next entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SetupQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl SetupQuality {
    pub fn size_factor(&self) -> f64 {
        match self {
            SetupQuality::Low => 0.5,
            SetupQuality::Medium => 0.75,
            SetupQuality::High => 1.0,
        }
    }
}

/// Profit target ladders, one rung per partial exit slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExitTargetSet {
    /// Risk/reward multipliers applied to the entry risk
    pub rrr: Vec<f64>,
    /// Fractions of the ATR daily range
    pub daily_range: Vec<f64>,
    /// Absolute price levels
    pub price_levels: Vec<f64>,
    /// Clamp targets up to the minimum-ATR floor
    pub apply_min_atr: bool,
}

impl Default for ExitTargetSet {
    fn default() -> Self {
        Self {
            rrr: vec![0.85, 1.5, 2.5],
            daily_range: vec![0.4, 0.6, 0.9],
            price_levels: Vec::new(),
            apply_min_atr: false,
        }
    }
}

/// Rung `index` of a ladder; indexes past the end reuse the last rung
pub fn ladder_rung(ladder: &[f64], index: usize) -> Option<f64> {
    ladder.get(index).or_else(|| ladder.last()).copied()
}

/// Per-strategy configuration attached to every entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BasePlan {
    pub targets: ExitTargetSet,
    /// Maximum number of partial exit slots
    pub batch_count: usize,
    /// No entries before this many minutes since open
    pub defer_minutes: Option<f64>,
    /// No entries at or after this many minutes since open
    pub stop_trading_minutes: Option<f64>,
    pub setup_quality: SetupQuality,
    /// Market-out requests are always allowed
    pub allow_early_flatten: bool,
    /// Stops may be tightened while the position is still at a loss
    pub allow_tighten_into_loss: bool,
    /// Skip exit adjudication entirely (manual control)
    pub disable_exit_rules: bool,
}

impl Default for BasePlan {
    fn default() -> Self {
        Self {
            targets: ExitTargetSet::default(),
            batch_count: 3,
            defer_minutes: None,
            stop_trading_minutes: None,
            setup_quality: SetupQuality::default(),
            allow_early_flatten: false,
            allow_tighten_into_loss: false,
            disable_exit_rules: false,
        }
    }
}

/// Plan for one side of a symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectionalPlan {
    pub enabled: bool,
    pub base: BasePlan,
    pub overrides: HashMap<StrategyKind, BasePlan>,
    /// Levels that act as resistance (long) / support (short) ahead of an entry
    pub watch_levels: Vec<f64>,
    /// When non-empty, entries outside every area are sized down
    pub tradable_areas: Vec<KeyLevel>,
    /// Entries inside any of these zones are vetoed
    pub no_trade_zones: Vec<KeyLevel>,
}

impl Default for DirectionalPlan {
    fn default() -> Self {
        Self {
            enabled: true,
            base: BasePlan::default(),
            overrides: HashMap::new(),
            watch_levels: Vec::new(),
            tradable_areas: Vec::new(),
            no_trade_zones: Vec::new(),
        }
    }
}

/// Per-symbol trading plan, loaded once per session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingPlan {
    pub symbol: String,
    pub atr: AtrInfo,
    /// Momentum key level for the session
    pub key_level: KeyLevel,
    #[serde(default)]
    pub long: DirectionalPlan,
    #[serde(default)]
    pub short: DirectionalPlan,
}

impl TradingPlan {
    pub fn new(symbol: &str, atr: AtrInfo, key_level: KeyLevel) -> Self {
        Self {
            symbol: symbol.to_string(),
            atr,
            key_level,
            long: DirectionalPlan::default(),
            short: DirectionalPlan::default(),
        }
    }

    pub fn side(&self, direction: Direction) -> &DirectionalPlan {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    pub fn side_mut(&mut self, direction: Direction) -> &mut DirectionalPlan {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    /// Strategy override if present, otherwise the side's base plan
    pub fn plan_for(&self, direction: Direction, kind: StrategyKind) -> &BasePlan {
        let side = self.side(direction);
        side.overrides.get(&kind).unwrap_or(&side.base)
    }
}

/// Load trading plans from a JSON array file
pub fn load_plans(path: &Path) -> Result<Vec<TradingPlan>, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|source| EngineError::PlanIo {
        path: path.display().to_string(),
        source,
    })?;
    parse_plans(&raw)
}

/// Parse trading plans from a JSON array
pub fn parse_plans(raw: &str) -> Result<Vec<TradingPlan>, EngineError> {
    let plans: Vec<TradingPlan> = serde_json::from_str(raw)?;
    tracing::info!("Loaded {} trading plans", plans.len());
    Ok(plans)
}
