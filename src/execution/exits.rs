/// Exit adjudication
///
/// Three decision surfaces (limit adjustment, stop adjustment, market-out),
/// each an ordered list of checks. The first check that allows wins. The
/// owning strategy's predicate runs last; when nothing allows, the action is
/// disallowed with the last reason evaluated.
use super::exit_checks::{
    batch_overflow, early_flatten, exit_rules_disabled, oversized_position, tighten_to_breakeven,
    time_override, trailing_limit, trailing_market_out, trailing_stop, ExitCheck, ExitContext,
};
use crate::models::{CheckRulesResult, ExitAction};

pub type ExitPredicate<'p> = &'p dyn Fn(&ExitContext) -> CheckRulesResult;

pub const LIMIT_CHECKS: [(&str, ExitCheck); 5] = [
    ("disable exit rules", exit_rules_disabled as ExitCheck),
    ("time override", time_override as ExitCheck),
    ("oversized position", oversized_position as ExitCheck),
    ("batch overflow", batch_overflow as ExitCheck),
    ("incremental trailing", trailing_limit as ExitCheck),
];

pub const STOP_CHECKS: [(&str, ExitCheck); 6] = [
    ("disable exit rules", exit_rules_disabled as ExitCheck),
    ("time override", time_override as ExitCheck),
    ("oversized position", oversized_position as ExitCheck),
    ("batch overflow", batch_overflow as ExitCheck),
    ("tighten to breakeven", tighten_to_breakeven as ExitCheck),
    ("incremental trailing", trailing_stop as ExitCheck),
];

pub const MARKET_OUT_CHECKS: [(&str, ExitCheck); 6] = [
    ("disable exit rules", exit_rules_disabled as ExitCheck),
    ("early flatten", early_flatten as ExitCheck),
    ("time override", time_override as ExitCheck),
    ("oversized position", oversized_position as ExitCheck),
    ("batch overflow", batch_overflow as ExitCheck),
    ("incremental trailing", trailing_market_out as ExitCheck),
];

fn first_match(checks: &[(&str, ExitCheck)], ctx: &ExitContext, predicate: ExitPredicate) -> CheckRulesResult {
    for (name, check) in checks {
        let result = check(ctx);
        if result.allowed {
            tracing::debug!("[{}] {} allowed by {}: {}", ctx.tag(), ctx.action, name, result.reason);
            return result;
        }
    }

    let result = predicate(ctx);
    if result.allowed {
        tracing::debug!("[{}] {} allowed by strategy: {}", ctx.tag(), ctx.action, result.reason);
    } else {
        tracing::debug!("[{}] {} disallowed: {}", ctx.tag(), ctx.action, result.reason);
    }
    result
}

pub fn check_limit_adjustment(ctx: &ExitContext, predicate: ExitPredicate) -> CheckRulesResult {
    first_match(&LIMIT_CHECKS, ctx, predicate)
}

pub fn check_stop_adjustment(ctx: &ExitContext, predicate: ExitPredicate) -> CheckRulesResult {
    first_match(&STOP_CHECKS, ctx, predicate)
}

pub fn check_market_out(ctx: &ExitContext, predicate: ExitPredicate) -> CheckRulesResult {
    first_match(&MARKET_OUT_CHECKS, ctx, predicate)
}

/// Route an exit action to its surface
pub fn adjudicate_exit(ctx: &ExitContext, predicate: ExitPredicate) -> CheckRulesResult {
    let key_index = ctx.action.key_index();
    if ctx.position.exit_pair(key_index).is_none() {
        return CheckRulesResult::disallow(format!("no exit pair #{}", key_index));
    }

    match ctx.action {
        ExitAction::AdjustLimit { .. } => check_limit_adjustment(ctx, predicate),
        ExitAction::AdjustStop { .. } => check_stop_adjustment(ctx, predicate),
        ExitAction::MarketOut { .. } => check_market_out(ctx, predicate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::market::test_support::{create_test_candles, snapshot_with};
    use crate::market::MarketSnapshot;
    use crate::models::{BasePlan, ExitPair, PositionSnapshot};

    fn long_position() -> PositionSnapshot {
        PositionSnapshot {
            symbol: "TEST".to_string(),
            quantity: 30,
            average_price: 100.0,
            exit_pairs: (0..3)
                .map(|i| ExitPair {
                    key_index: i,
                    quantity: 10,
                    stop_price: 99.0,
                    limit_price: Some(102.0),
                })
                .collect(),
            tradebook_id: None,
        }
    }

    /// `n` one-minute candles; the second one spans 100.2 - 101.0
    fn market(n: usize) -> MarketSnapshot {
        let mut prices = vec![(100.0, 100.6, 99.8, 100.4); n];
        if n > 1 {
            prices[1] = (100.4, 101.0, 100.2, 100.8);
        }
        snapshot_with(create_test_candles(&prices), 99.0)
    }

    fn never(_: &ExitContext) -> CheckRulesResult {
        CheckRulesResult::disallow("strategy says hold")
    }

    fn always(_: &ExitContext) -> CheckRulesResult {
        CheckRulesResult::allow("strategy says go")
    }

    fn check(action: ExitAction, position: &PositionSnapshot, plan: &BasePlan, market: &MarketSnapshot, manual: bool) -> CheckRulesResult {
        let settings = EngineSettings::default();
        let ctx = ExitContext::new(action, position, plan, market, &settings, manual).unwrap();
        adjudicate_exit(&ctx, &never)
    }

    #[test]
    fn test_default_is_disallowed_with_last_reason() {
        let result = check(
            ExitAction::MarketOut { key_index: 0 },
            &long_position(),
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(!result.allowed);
        assert_eq!(result.reason, "strategy says hold");
    }

    #[test]
    fn test_flat_position_has_no_context() {
        let mut position = long_position();
        position.quantity = 0;
        let settings = EngineSettings::default();
        let plan = BasePlan::default();
        let snapshot = market(3);
        assert!(ExitContext::new(
            ExitAction::MarketOut { key_index: 0 },
            &position,
            &plan,
            &snapshot,
            &settings,
            false
        )
        .is_none());
    }

    #[test]
    fn test_unknown_exit_pair() {
        let result = check(
            ExitAction::MarketOut { key_index: 9 },
            &long_position(),
            &BasePlan::default(),
            &market(3),
            false,
        );
        assert_eq!(result.reason, "no exit pair #9");
    }

    #[test]
    fn test_manual_control_wins_first() {
        // Time override would also allow; the earlier rule's reason is reported
        let result = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 100.1 },
            &long_position(),
            &BasePlan::default(),
            &market(20),
            true,
        );
        assert!(result.allowed);
        assert_eq!(result.reason, "manual control, exit rules disabled");
    }

    #[test]
    fn test_early_flatten_only_for_market_out() {
        let plan = BasePlan {
            allow_early_flatten: true,
            ..Default::default()
        };
        let out = check(ExitAction::MarketOut { key_index: 0 }, &long_position(), &plan, &market(7), false);
        assert_eq!(out.reason, "plan allows early flatten");

        let limit = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 100.1 },
            &long_position(),
            &plan,
            &market(7),
            false,
        );
        assert!(!limit.allowed);
    }

    #[test]
    fn test_time_override_before_oversized() {
        let mut position = long_position();
        for pair in &mut position.exit_pairs {
            pair.stop_price = 90.0;
        }
        // 30 shares * $10 = $300 risk > $100 budget, but 20 minutes in
        let result = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 100.1 },
            &position,
            &BasePlan::default(),
            &market(20),
            false,
        );
        assert_eq!(result.reason, "20.0 minutes since open");

        let early = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 100.1 },
            &position,
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(early.reason.starts_with("position risk $300.00 exceeds budget"));
    }

    #[test]
    fn test_oversized_position_never_widens_stop() {
        let mut position = long_position();
        for pair in &mut position.exit_pairs {
            pair.stop_price = 90.0;
        }

        // $300 at risk against a $100 budget; moving the stop to 80 adds risk
        let wider = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 80.0 },
            &position,
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(!wider.allowed);
        assert_eq!(wider.reason, "strategy says hold");

        let tighter = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 95.0 },
            &position,
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(tighter.allowed);
        assert!(tighter.reason.starts_with("position risk $300.00 exceeds budget"));

        let unchanged = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 90.0 },
            &position,
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(unchanged.allowed);

        let out = check(ExitAction::MarketOut { key_index: 0 }, &position, &BasePlan::default(), &market(7), false);
        assert!(out.reason.starts_with("position risk $300.00 exceeds budget"));
    }

    #[test]
    fn test_trailing_reference_window_bounds() {
        use crate::execution::trailing_reference_candle;
        use chrono::Duration;

        let shifted = |n: usize, seconds: i64| {
            let mut m = market(n);
            m.now = m.now + Duration::seconds(seconds);
            m
        };

        // Both ends of the 2-5 minute window use the second one-minute candle
        assert_eq!(trailing_reference_candle(&market(2)).map(|c| c.high), Some(101.0));
        assert_eq!(trailing_reference_candle(&market(5)).map(|c| c.high), Some(101.0));
        assert!(trailing_reference_candle(&shifted(2, -1)).is_none());
        assert!(trailing_reference_candle(&shifted(5, 1)).is_none());

        // Nothing between the windows
        assert!(trailing_reference_candle(&shifted(10, -1)).is_none());

        // From ten minutes on, the second five-minute candle
        let at_ten = market(10);
        let reference = trailing_reference_candle(&at_ten).unwrap();
        assert_eq!(reference.timestamp, at_ten.market_open + Duration::minutes(5));
        assert_eq!(reference.high, 100.6);
    }

    #[test]
    fn test_batch_overflow() {
        let plan = BasePlan {
            batch_count: 2,
            ..Default::default()
        };
        let result = check(ExitAction::MarketOut { key_index: 0 }, &long_position(), &plan, &market(7), false);
        assert_eq!(result.reason, "3 exit legs, more than batch count 2");
    }

    #[test]
    fn test_stop_to_breakeven_allowed() {
        let result = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 100.0 },
            &long_position(),
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(result.allowed);
        assert!(result.reason.contains("breakeven"));
    }

    #[test]
    fn test_trailing_stop_window() {
        // 3 minutes in: reference is the second one-minute candle, low 100.2
        let trails = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 99.5 },
            &long_position(),
            &BasePlan::default(),
            &market(3),
            false,
        );
        assert!(trails.allowed);
        assert!(trails.reason.starts_with("stop 99.50 trails"));

        // Outside the windows the strategy predicate decides
        let later = check(
            ExitAction::AdjustStop { key_index: 0, new_price: 99.5 },
            &long_position(),
            &BasePlan::default(),
            &market(7),
            false,
        );
        assert!(!later.allowed);
    }

    #[test]
    fn test_trailing_limit_window() {
        // Reference high 101.0
        let tight = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 100.5 },
            &long_position(),
            &BasePlan::default(),
            &market(3),
            false,
        );
        assert!(!tight.allowed);

        let wide = check(
            ExitAction::AdjustLimit { key_index: 0, new_price: 101.0 },
            &long_position(),
            &BasePlan::default(),
            &market(3),
            false,
        );
        assert!(wide.allowed);
    }

    #[test]
    fn test_trailing_market_out_uses_price() {
        let mut snapshot = market(3);
        snapshot.price = 100.1;
        let result = check(
            ExitAction::MarketOut { key_index: 0 },
            &long_position(),
            &BasePlan::default(),
            &snapshot,
            false,
        );
        assert!(result.allowed);
        assert!(result.reason.starts_with("price 100.10 through"));
    }

    #[test]
    fn test_strategy_predicate_runs_last() {
        let settings = EngineSettings::default();
        let position = long_position();
        let plan = BasePlan::default();
        let snapshot = market(7);
        let ctx = ExitContext::new(
            ExitAction::MarketOut { key_index: 1 },
            &position,
            &plan,
            &snapshot,
            &settings,
            false,
        )
        .unwrap();
        let result = adjudicate_exit(&ctx, &always);
        assert!(result.allowed);
        assert_eq!(result.reason, "strategy says go");
    }

    #[test]
    fn test_declared_order_is_locked() {
        let names: Vec<_> = MARKET_OUT_CHECKS.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "disable exit rules",
                "early flatten",
                "time override",
                "oversized position",
                "batch overflow",
                "incremental trailing",
            ]
        );
        let stop: Vec<_> = STOP_CHECKS.iter().map(|(name, _)| *name).collect();
        assert_eq!(stop[4], "tighten to breakeven");
        assert_eq!(LIMIT_CHECKS.len(), 5);
    }
}
