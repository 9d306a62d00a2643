use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BasePlan, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

/// Bound stop + limit (or stop + market) pair for one partial exit slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExitPair {
    pub key_index: usize,
    pub quantity: i64,
    pub stop_price: f64,
    /// None for a stop + market pair
    pub limit_price: Option<f64>,
}

/// Proposed mutation of an exit pair, submitted for adjudication
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitAction {
    AdjustLimit { key_index: usize, new_price: f64 },
    AdjustStop { key_index: usize, new_price: f64 },
    MarketOut { key_index: usize },
}

impl ExitAction {
    pub fn key_index(&self) -> usize {
        match self {
            ExitAction::AdjustLimit { key_index, .. }
            | ExitAction::AdjustStop { key_index, .. }
            | ExitAction::MarketOut { key_index } => *key_index,
        }
    }
}

impl std::fmt::Display for ExitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitAction::AdjustLimit { key_index, new_price } => {
                write!(f, "adjust limit #{} to {:.2}", key_index, new_price)
            }
            ExitAction::AdjustStop { key_index, new_price } => {
                write!(f, "adjust stop #{} to {:.2}", key_index, new_price)
            }
            ExitAction::MarketOut { key_index } => write!(f, "market out #{}", key_index),
        }
    }
}

/// Verdict of one exit adjudication check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRulesResult {
    pub allowed: bool,
    pub reason: String,
}

impl CheckRulesResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn disallow(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CheckRulesResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.allowed { "allowed" } else { "disallowed" };
        write!(f, "{}: {}", verdict, self.reason)
    }
}

/// Live position for one symbol as reported by the order layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Signed net quantity (negative when short)
    pub quantity: i64,
    pub average_price: f64,
    pub exit_pairs: Vec<ExitPair>,
    /// Tradebook that submitted the entry, if known
    pub tradebook_id: Option<String>,
}

impl PositionSnapshot {
    pub fn direction(&self) -> Option<Direction> {
        match self.quantity {
            q if q > 0 => Some(Direction::Long),
            q if q < 0 => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Dollar risk left if every exit stop is hit
    pub fn open_risk(&self) -> f64 {
        let Some(direction) = self.direction() else {
            return 0.0;
        };

        self.exit_pairs
            .iter()
            .map(|pair| {
                let loss_per_share = (self.average_price - pair.stop_price) * direction.sign();
                loss_per_share.max(0.0) * pair.quantity.unsigned_abs() as f64
            })
            .sum()
    }

    pub fn exit_pair(&self, key_index: usize) -> Option<&ExitPair> {
        self.exit_pairs.iter().find(|p| p.key_index == key_index)
    }
}

/// Account-level view: realized P&L, positions and pending entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub realized_pnl: f64,
    pub entries_today: u32,
    pub positions: HashMap<String, PositionSnapshot>,
    pub pending_entries: HashSet<(String, Direction)>,
}

impl AccountSnapshot {
    pub fn position(&self, symbol: &str) -> Option<&PositionSnapshot> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }

    pub fn has_pending_entry(&self, symbol: &str, direction: Direction) -> bool {
        self.pending_entries
            .contains(&(symbol.to_string(), direction))
    }

    pub fn is_flat(&self, symbol: &str) -> bool {
        self.position(symbol).is_none()
    }
}

/// Entry order handed to the order gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryInstruction {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub order_type: OrderType,
    pub price: f64,
    pub stop_price: f64,
    pub risk_level_price: f64,
    pub size: f64,
    /// Minimum target price per exit slot
    pub target_prices: Vec<f64>,
    /// Copy of the plan at submission time
    pub plan: BasePlan,
    pub tradebook_id: String,
    pub dry_run: bool,
}
