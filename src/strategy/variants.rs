/// Variant table
///
/// Every tradebook runs the same state machine driver; a variant only
/// supplies its levels, its entry trigger and its exit predicate.
use super::state::TradebookState;
use super::Tradebook;
use crate::execution::ExitContext;
use crate::indicators::atr_range_used;
use crate::market::MarketSnapshot;
use crate::models::{Candle, CheckRulesResult, Direction, ExitAction, KeyLevel, OrderType, StrategyKind};
use crate::signals::{
    first_pullback_status, has_retested_level, is_reversal_bar, is_with_vwap, is_worse_than_vwap, last_reversal_bar,
    PullbackStatus,
};

/// Candles after the open that still count as the opening drive / flush
const OPENING_WINDOW: usize = 5;
/// Day range, in ATRs, a move must cover before a reversal is considered
const REVERSAL_MIN_ATR_USED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Momentum,
    Vwap,
}

/// Momentum machine anchors: closing beyond `momentum` starts a leg,
/// closing beyond `failure` (against the trade) fails the idea.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub momentum: f64,
    pub failure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySetup {
    pub entry_price: f64,
    pub stop_price: f64,
    pub risk_level_price: f64,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Hold,
    Enter(EntrySetup),
    /// Conditions are forming; re-evaluate shortly
    Recheck,
}

#[derive(Clone, Copy)]
pub struct VariantSpec {
    pub kind: StrategyKind,
    pub allowed_direction: Option<Direction>,
    /// Stays enabled whatever the selector decides
    pub enable_by_default: bool,
    pub machine: Machine,
    pub levels: fn(&Tradebook, &MarketSnapshot) -> Option<Levels>,
    pub trigger: fn(&Tradebook, &MarketSnapshot, bool) -> Trigger,
    pub exit_predicate: fn(&Tradebook, &ExitContext) -> CheckRulesResult,
}

pub fn variant_spec(kind: StrategyKind) -> VariantSpec {
    match kind {
        StrategyKind::AboveWaterBreakout => VariantSpec {
            kind,
            allowed_direction: Some(Direction::Long),
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: key_level_levels,
            trigger: first_leg_trigger,
            exit_predicate: single_level_exit,
        },
        StrategyKind::BelowWaterBreakdown => VariantSpec {
            kind,
            allowed_direction: Some(Direction::Short),
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: key_level_levels,
            trigger: first_leg_trigger,
            exit_predicate: single_level_exit,
        },
        StrategyKind::VwapContinuation => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: vwap_levels,
            trigger: vwap_pullback_trigger,
            exit_predicate: worse_than_vwap_exit,
        },
        StrategyKind::VwapContinuationFailed => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: false,
            machine: Machine::Vwap,
            levels: no_levels,
            trigger: vwap_cross_trigger,
            exit_predicate: vwap_reclaimed_exit,
        },
        StrategyKind::OpenDrive => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: open_drive_levels,
            trigger: open_drive_trigger,
            exit_predicate: lost_open_exit,
        },
        StrategyKind::OpenFlush => VariantSpec {
            kind,
            allowed_direction: Some(Direction::Long),
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: open_flush_levels,
            trigger: first_leg_trigger,
            exit_predicate: flush_low_exit,
        },
        StrategyKind::Reversal => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: reversal_levels,
            trigger: reversal_trigger,
            exit_predicate: pivot_exit,
        },
        StrategyKind::GapAndGo => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: false,
            machine: Machine::Momentum,
            levels: gap_and_go_levels,
            trigger: first_leg_trigger,
            exit_predicate: premarket_level_exit,
        },
        StrategyKind::GapReversal => VariantSpec {
            kind,
            allowed_direction: None,
            enable_by_default: true,
            machine: Machine::Momentum,
            levels: gap_reversal_levels,
            trigger: first_leg_trigger,
            exit_predicate: new_extreme_exit,
        },
    }
}

fn no_levels(_: &Tradebook, _: &MarketSnapshot) -> Option<Levels> {
    None
}

fn key_level_levels(book: &Tradebook, _: &MarketSnapshot) -> Option<Levels> {
    Some(Levels {
        momentum: book.key_level.breakout(book.direction),
        failure: book.key_level.support(book.direction),
    })
}

fn vwap_levels(_: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let vwap = *market.vwaps.last()?;
    Some(Levels {
        momentum: vwap,
        failure: vwap,
    })
}

fn open_drive_levels(book: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let first = market.candles.first()?;
    Some(Levels {
        momentum: first.favorable_extreme(book.direction),
        failure: first.open,
    })
}

/// Most adverse price printed in the opening window
fn flush_extreme(direction: Direction, candles: &[Candle]) -> Option<f64> {
    candles
        .iter()
        .take(OPENING_WINDOW)
        .map(|c| c.adverse_extreme(direction))
        .reduce(|a, b| direction.worse(a, b))
}

fn open_flush_levels(book: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let first = market.candles.first()?;
    let d = book.direction;
    // The flush: opening bar against the trade, pushing below its own open
    let flushed = if d.is_long() { first.is_red() } else { first.is_green() };
    if !flushed {
        return None;
    }
    let low = flush_extreme(d, &market.candles)?;
    Some(Levels {
        momentum: first.open,
        failure: low,
    })
}

/// Bar that rejected the move into the day's extreme, with its index
fn reversal_pivot(direction: Direction, candles: &[Candle]) -> Option<(usize, &Candle)> {
    let extreme = candles
        .iter()
        .map(|c| c.adverse_extreme(direction))
        .reduce(|a, b| direction.worse(a, b))?;
    last_reversal_bar(candles, direction.opposite(), true)
        .filter(|(_, bar)| bar.adverse_extreme(direction) == extreme)
}

fn reversal_levels(book: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let (_, bar) = reversal_pivot(book.direction, &market.candles)?;
    Some(Levels {
        momentum: bar.favorable_extreme(book.direction),
        failure: bar.adverse_extreme(book.direction),
    })
}

fn gap_and_go_levels(book: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let level = premarket_level(book.direction, market)?;
    let open = market.open_price()?;
    // Needs an open gapped toward the premarket extreme
    if !book.direction.is_favorable(open, market.vwap_before_open?) {
        return None;
    }
    Some(Levels {
        momentum: level,
        failure: open,
    })
}

fn gap_reversal_levels(book: &Tradebook, market: &MarketSnapshot) -> Option<Levels> {
    let open = market.open_price()?;
    let d = book.direction;
    // Gapped against the trade: a long reverses a gap down
    if !d.is_favorable(market.vwap_before_open?, open) {
        return None;
    }
    let extreme = market
        .candles
        .iter()
        .map(|c| c.adverse_extreme(d))
        .reduce(|a, b| d.worse(a, b))?;
    Some(Levels {
        momentum: open,
        failure: extreme,
    })
}

fn premarket_level(direction: Direction, market: &MarketSnapshot) -> Option<f64> {
    match direction {
        Direction::Long => market.premarket_high,
        Direction::Short => market.premarket_low,
    }
}

/// Enter on the candle that first closes beyond the momentum level.
/// Stop goes beyond the worse of the candle extreme and the failure level.
fn first_leg_trigger(book: &Tradebook, market: &MarketSnapshot, _recheck: bool) -> Trigger {
    if book.state() != TradebookState::Momentum || book.leg_count() != 1 {
        return Trigger::Hold;
    }
    // One entry per leg
    if book.entered_leg() == Some(book.leg_count()) {
        return Trigger::Hold;
    }
    let Some(levels) = book.levels(market) else {
        return Trigger::Hold;
    };
    let n = market.candles.len();
    if n < 2 {
        return Trigger::Hold;
    }

    let d = book.direction;
    let (prev, last) = (&market.candles[n - 2], &market.candles[n - 1]);
    let fresh_break = d.is_favorable(last.close, levels.momentum) && !d.is_favorable(prev.close, levels.momentum);
    if !fresh_break {
        return Trigger::Hold;
    }

    Trigger::Enter(EntrySetup {
        entry_price: market.price,
        stop_price: d.worse(last.adverse_extreme(d), levels.failure),
        risk_level_price: levels.failure,
        order_type: OrderType::Market,
    })
}

fn open_drive_trigger(book: &Tradebook, market: &MarketSnapshot, recheck: bool) -> Trigger {
    if market.candles.len() > OPENING_WINDOW {
        return Trigger::Hold;
    }
    first_leg_trigger(book, market, recheck)
}

/// Enter on the candle that recovers the first pullback above VWAP
fn vwap_pullback_trigger(book: &Tradebook, market: &MarketSnapshot, _recheck: bool) -> Trigger {
    if book.state() != TradebookState::Momentum {
        return Trigger::Hold;
    }
    let Some(vwap) = market.vwaps.last().copied() else {
        return Trigger::Hold;
    };
    let d = book.direction;
    if !is_with_vwap(d, market.price, vwap) {
        return Trigger::Hold;
    }

    // Scan from the first close on the trade side of VWAP
    let Some(start) = market
        .candles
        .iter()
        .zip(&market.vwaps)
        .position(|(c, v)| is_with_vwap(d, c.close, *v))
    else {
        return Trigger::Hold;
    };
    let run = &market.candles[start..];
    if run.len() < 3 {
        return Trigger::Hold;
    }

    let now = first_pullback_status(run, d);
    let before = first_pullback_status(&run[..run.len() - 1], d);
    if now.status != PullbackStatus::Recovered || before.status != PullbackStatus::InProgress {
        return Trigger::Hold;
    }
    let Some(stop) = now.pullback_extreme else {
        return Trigger::Hold;
    };

    Trigger::Enter(EntrySetup {
        entry_price: market.price,
        stop_price: stop,
        risk_level_price: vwap,
        order_type: OrderType::Market,
    })
}

/// Enter on the candle that crosses VWAP in the trade's direction
fn vwap_cross_trigger(book: &Tradebook, market: &MarketSnapshot, _recheck: bool) -> Trigger {
    if book.state() != TradebookState::LostVwap {
        return Trigger::Hold;
    }
    let (Some(last), Some(vwap)) = (market.candles.last(), market.vwaps.last().copied()) else {
        return Trigger::Hold;
    };
    let d = book.direction;

    Trigger::Enter(EntrySetup {
        entry_price: market.price,
        stop_price: d.worse(last.adverse_extreme(d), vwap),
        risk_level_price: vwap,
        order_type: OrderType::Market,
    })
}

/// A strict reversal bar at the day's extreme after an extended move asks
/// for a recheck; the recheck enters once price clears the bar.
fn reversal_trigger(book: &Tradebook, market: &MarketSnapshot, recheck: bool) -> Trigger {
    let d = book.direction;
    let (Some(high), Some(low)) = (market.high_of_day(), market.low_of_day()) else {
        return Trigger::Hold;
    };
    if atr_range_used(high, low, &market.atr) < REVERSAL_MIN_ATR_USED {
        return Trigger::Hold;
    }

    let n = market.candles.len();
    let Some((idx, bar)) = reversal_pivot(d, &market.candles) else {
        return Trigger::Hold;
    };
    if idx + 1 != n || !is_reversal_bar(bar, d.opposite(), true) {
        return Trigger::Hold;
    }

    if !recheck {
        return Trigger::Recheck;
    }

    let trigger_price = bar.favorable_extreme(d);
    if !d.is_favorable(market.price, trigger_price) {
        return Trigger::Recheck;
    }

    Trigger::Enter(EntrySetup {
        entry_price: market.price,
        stop_price: bar.adverse_extreme(d),
        risk_level_price: bar.adverse_extreme(d),
        order_type: OrderType::Market,
    })
}

/// Reason exits stay blocked while price holds a single momentum level.
/// None once the level is lost.
pub fn disallowed_reason_for_single_level_momentum(
    direction: Direction,
    price: f64,
    key_level: &KeyLevel,
) -> Option<String> {
    let support = key_level.support(direction);
    let breakout = key_level.breakout(direction);

    if direction.is_favorable(support, price) {
        None
    } else if direction.is_favorable(price, breakout) {
        Some(format!(
            "price {:.2} still holding key level {:.2}",
            price, support
        ))
    } else {
        // Price sits on or inside the level
        Some(format!(
            "edge case, not supposed to happen: price {} key level {}-{}",
            price, key_level.low, key_level.high
        ))
    }
}

/// Exits wait for the key level to be lost. A stop may trail once price has
/// come back to retest the breakout level and held it.
fn single_level_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let d = book.direction;
    let Some(reason) = disallowed_reason_for_single_level_momentum(d, ctx.market.price, &book.key_level) else {
        return CheckRulesResult::allow(format!("key level {:.2} lost", book.key_level.support(d)));
    };

    if let ExitAction::AdjustStop { .. } = ctx.action {
        let breakout = book.key_level.breakout(d);
        let buffer = ctx.settings.near_level_atr_ratio * ctx.market.atr.average;
        if has_retested_level(&ctx.market.candles, d, breakout, buffer) {
            return CheckRulesResult::allow(format!("key level {:.2} retested and held", breakout));
        }
    }
    CheckRulesResult::disallow(reason)
}

fn worse_than_vwap_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let Some(vwap) = ctx.market.latest_vwap() else {
        return CheckRulesResult::disallow("no vwap yet");
    };
    if is_worse_than_vwap(book.direction, ctx.market.price, vwap) {
        CheckRulesResult::allow(format!("price {:.2} worse than vwap {:.2}", ctx.market.price, vwap))
    } else {
        CheckRulesResult::disallow(format!("price {:.2} holding vwap {:.2}", ctx.market.price, vwap))
    }
}

fn vwap_reclaimed_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let (Some(last), Some(vwap)) = (ctx.market.candles.last(), ctx.market.vwaps.last().copied()) else {
        return CheckRulesResult::disallow("no closed candle yet");
    };
    if is_worse_than_vwap(book.direction, last.close, vwap) {
        CheckRulesResult::allow(format!("vwap {:.2} reclaimed against the trade", vwap))
    } else {
        CheckRulesResult::disallow(format!("last close {:.2} still beyond vwap {:.2}", last.close, vwap))
    }
}

fn lost_open_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let Some(open) = ctx.market.open_price() else {
        return CheckRulesResult::disallow("no open price yet");
    };
    if book.direction.is_favorable(open, ctx.market.price) {
        CheckRulesResult::allow(format!("lost the open {:.2}", open))
    } else {
        CheckRulesResult::disallow(format!("holding the open {:.2}", open))
    }
}

fn flush_low_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let Some(low) = flush_extreme(book.direction, &ctx.market.candles) else {
        return CheckRulesResult::disallow("no flush recorded");
    };
    if !book.direction.is_favorable(ctx.market.price, low) {
        CheckRulesResult::allow(format!("flush low {:.2} broken", low))
    } else {
        CheckRulesResult::disallow(format!("holding flush low {:.2}", low))
    }
}

fn pivot_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let Some(pivot) = book.entry_pivot() else {
        return CheckRulesResult::disallow("no pivot recorded");
    };
    if book.direction.is_favorable(pivot, ctx.market.price) {
        CheckRulesResult::allow(format!("pivot {:.2} broken", pivot))
    } else {
        CheckRulesResult::disallow(format!("holding pivot {:.2}", pivot))
    }
}

fn premarket_level_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let Some(level) = premarket_level(book.direction, ctx.market) else {
        return CheckRulesResult::disallow("no premarket level");
    };
    if book.direction.is_favorable(level, ctx.market.price) {
        CheckRulesResult::allow(format!("lost premarket level {:.2}", level))
    } else {
        CheckRulesResult::disallow(format!("holding premarket level {:.2}", level))
    }
}

fn new_extreme_exit(book: &Tradebook, ctx: &ExitContext) -> CheckRulesResult {
    let d = book.direction;
    let Some(extreme) = ctx
        .market
        .candles
        .iter()
        .map(|c| c.adverse_extreme(d))
        .reduce(|a, b| d.worse(a, b))
    else {
        return CheckRulesResult::disallow("no closed candle yet");
    };
    if d.is_favorable(extreme, ctx.market.price) {
        CheckRulesResult::allow(format!("new day extreme through {:.2}", extreme))
    } else {
        CheckRulesResult::disallow(format!("day extreme {:.2} holding", extreme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::market::test_support::{create_test_candles, snapshot_with};
    use crate::models::{BasePlan, ExitPair, PositionSnapshot};

    fn breakout_position() -> PositionSnapshot {
        PositionSnapshot {
            symbol: "TEST".to_string(),
            quantity: 10,
            average_price: 101.5,
            exit_pairs: vec![ExitPair {
                key_index: 0,
                quantity: 10,
                stop_price: 100.0,
                limit_price: None,
            }],
            tradebook_id: None,
        }
    }

    fn single_level(candles: &[(f64, f64, f64, f64)], action: ExitAction) -> CheckRulesResult {
        let book = Tradebook::new("TEST", Direction::Long, StrategyKind::AboveWaterBreakout, KeyLevel::new(101.0, 100.0))
            .unwrap();
        let market = snapshot_with(create_test_candles(candles), 99.0);
        let position = breakout_position();
        let plan = BasePlan::default();
        let settings = EngineSettings::default();
        let ctx = ExitContext::new(action, &position, &plan, &market, &settings, false).unwrap();
        single_level_exit(&book, &ctx)
    }

    #[test]
    fn test_single_level_exit_trails_after_retest() {
        let stop = ExitAction::AdjustStop {
            key_index: 0,
            new_price: 100.8,
        };
        // Pushed 0.4 beyond 101 then came back to 101.2
        let retested = [
            (100.5, 100.8, 100.2, 100.6),
            (100.6, 101.6, 100.5, 101.5),
            (101.5, 101.7, 101.2, 101.4),
        ];
        let result = single_level(&retested, stop);
        assert!(result.allowed);
        assert_eq!(result.reason, "key level 101.00 retested and held");

        // Market-outs still wait for the level to go
        let result = single_level(&retested, ExitAction::MarketOut { key_index: 0 });
        assert!(!result.allowed);
        assert!(result.reason.contains("still holding key level"));

        // Never came back within the buffer
        let extended = [
            (100.5, 100.8, 100.2, 100.6),
            (100.6, 101.6, 100.5, 101.5),
            (101.5, 102.2, 101.5, 102.1),
        ];
        assert!(!single_level(&extended, stop).allowed);
    }

    #[test]
    fn test_single_level_exit_allows_once_lost() {
        let lost = [(100.5, 100.8, 100.2, 100.6), (100.6, 100.7, 99.5, 99.8)];
        let result = single_level(&lost, ExitAction::MarketOut { key_index: 0 });
        assert!(result.allowed);
        assert_eq!(result.reason, "key level 100.00 lost");
    }

    #[test]
    fn test_single_level_momentum_reasons() {
        let kl = KeyLevel::single(100.0);
        assert!(disallowed_reason_for_single_level_momentum(Direction::Long, 99.5, &kl).is_none());
        assert_eq!(
            disallowed_reason_for_single_level_momentum(Direction::Long, 100.5, &kl).unwrap(),
            "price 100.50 still holding key level 100.00"
        );
        assert_eq!(
            disallowed_reason_for_single_level_momentum(Direction::Long, 100.0, &kl).unwrap(),
            "edge case, not supposed to happen: price 100 key level 100-100"
        );
        assert!(disallowed_reason_for_single_level_momentum(Direction::Short, 100.5, &kl).is_none());
    }

    #[test]
    fn test_direction_restrictions() {
        assert_eq!(
            variant_spec(StrategyKind::AboveWaterBreakout).allowed_direction,
            Some(Direction::Long)
        );
        assert_eq!(
            variant_spec(StrategyKind::BelowWaterBreakdown).allowed_direction,
            Some(Direction::Short)
        );
        assert_eq!(variant_spec(StrategyKind::OpenFlush).allowed_direction, Some(Direction::Long));
        assert!(variant_spec(StrategyKind::Reversal).allowed_direction.is_none());
    }

    #[test]
    fn test_only_gap_reversal_enabled_by_default() {
        let defaults: Vec<_> = StrategyKind::ALL
            .iter()
            .filter(|k| variant_spec(**k).enable_by_default)
            .collect();
        assert_eq!(defaults, vec![&StrategyKind::GapReversal]);
    }

    #[test]
    fn test_spec_kind_matches() {
        for kind in StrategyKind::ALL {
            assert_eq!(variant_spec(kind).kind, kind);
        }
    }
}
