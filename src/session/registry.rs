use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{Direction, StrategyKind, TradingPlan};
use crate::strategy::{variant_spec, Tradebook};

/// Every tradebook of the session, keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct TradebookRegistry {
    books: HashMap<String, Vec<Tradebook>>,
}

impl TradebookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one tradebook per tradable (direction, variant) of the plan.
    /// Sides disabled in the plan get no tradebooks.
    pub fn from_plans<'a>(plans: impl IntoIterator<Item = &'a TradingPlan>) -> Result<Self, EngineError> {
        let mut registry = Self::new();
        for plan in plans {
            registry.register(plan)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, plan: &TradingPlan) -> Result<usize, EngineError> {
        let mut books = Vec::new();
        for direction in [Direction::Long, Direction::Short] {
            if !plan.side(direction).enabled {
                continue;
            }
            for kind in StrategyKind::ALL {
                let allowed = variant_spec(kind).allowed_direction;
                if allowed.is_some_and(|d| d != direction) {
                    continue;
                }
                books.push(Tradebook::new(&plan.symbol, direction, kind, plan.key_level)?);
            }
        }

        let count = books.len();
        tracing::debug!("[{}] registered {} tradebooks", plan.symbol, count);
        self.books.insert(plan.symbol.clone(), books);
        Ok(count)
    }

    pub fn for_symbol(&self, symbol: &str) -> &[Tradebook] {
        self.books.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_symbol_mut(&mut self, symbol: &str) -> &mut [Tradebook] {
        self.books
            .get_mut(symbol)
            .map(Vec::as_mut_slice)
            .unwrap_or(&mut [])
    }

    pub fn get(&self, id: &str) -> Option<&Tradebook> {
        self.books.values().flatten().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tradebook> {
        self.books.values_mut().flatten().find(|b| b.id == id)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.books.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.books.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tradebook, cancelling their pending rechecks
    pub fn clear(&mut self) {
        for book in self.books.values_mut().flatten() {
            book.clear_state();
        }
        self.books.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AtrInfo, KeyLevel};

    #[test]
    fn test_register_skips_restricted_directions() {
        let plan = TradingPlan::new("AAPL", AtrInfo::new(4.0), KeyLevel::new(101.0, 100.0));
        let registry = TradebookRegistry::from_plans([&plan]).unwrap();

        // 9 variants: 2 long-only, 1 short-only, 6 both ways
        assert_eq!(registry.for_symbol("AAPL").len(), 15);
        assert!(registry.get("AAPL-long-AboveWaterBreakout").is_some());
        assert!(registry.get("AAPL-short-AboveWaterBreakout").is_none());
        assert!(registry.get("AAPL-short-BelowWaterBreakdown").is_some());
    }

    #[test]
    fn test_disabled_side_has_no_books() {
        let mut plan = TradingPlan::new("AAPL", AtrInfo::new(4.0), KeyLevel::single(100.0));
        plan.short.enabled = false;
        let registry = TradebookRegistry::from_plans([&plan]).unwrap();

        assert_eq!(registry.len(), 8);
        assert!(registry
            .for_symbol("AAPL")
            .iter()
            .all(|b| b.direction == Direction::Long));
    }

    #[test]
    fn test_unknown_symbol_is_empty() {
        let mut registry = TradebookRegistry::new();
        assert!(registry.for_symbol("NOPE").is_empty());
        assert!(registry.for_symbol_mut("NOPE").is_empty());
        assert!(registry.is_empty());
    }
}
