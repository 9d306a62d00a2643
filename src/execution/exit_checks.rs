use crate::config::EngineSettings;
use crate::market::MarketSnapshot;
use crate::models::{BasePlan, Candle, CheckRulesResult, Direction, ExitAction, PositionSnapshot};
use crate::risk::tighten_stop_check;

/// Everything one exit check may read
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub action: ExitAction,
    pub direction: Direction,
    pub position: &'a PositionSnapshot,
    pub plan: &'a BasePlan,
    pub market: &'a MarketSnapshot,
    pub settings: &'a EngineSettings,
    /// A human operator has taken over this symbol
    pub manual_control: bool,
}

impl<'a> ExitContext<'a> {
    /// None when the position is flat
    pub fn new(
        action: ExitAction,
        position: &'a PositionSnapshot,
        plan: &'a BasePlan,
        market: &'a MarketSnapshot,
        settings: &'a EngineSettings,
        manual_control: bool,
    ) -> Option<Self> {
        Some(Self {
            action,
            direction: position.direction()?,
            position,
            plan,
            market,
            settings,
            manual_control,
        })
    }

    pub fn tag(&self) -> String {
        format!("{} {}", self.position.symbol, self.direction)
    }
}

pub type ExitCheck = fn(&ExitContext) -> CheckRulesResult;

pub fn exit_rules_disabled(ctx: &ExitContext) -> CheckRulesResult {
    if ctx.manual_control {
        CheckRulesResult::allow("manual control, exit rules disabled")
    } else if ctx.plan.disable_exit_rules {
        CheckRulesResult::allow("exit rules disabled by plan")
    } else {
        CheckRulesResult::disallow("exit rules active")
    }
}

pub fn early_flatten(ctx: &ExitContext) -> CheckRulesResult {
    if ctx.plan.allow_early_flatten {
        CheckRulesResult::allow("plan allows early flatten")
    } else {
        CheckRulesResult::disallow("early flatten not allowed")
    }
}

pub fn time_override(ctx: &ExitContext) -> CheckRulesResult {
    let minutes = ctx.market.minutes_since_open();
    if minutes >= ctx.settings.exit_override_minutes {
        CheckRulesResult::allow(format!("{:.1} minutes since open", minutes))
    } else {
        CheckRulesResult::disallow(format!(
            "only {:.1} minutes since open, exits free after {:.0}",
            minutes, ctx.settings.exit_override_minutes
        ))
    }
}

/// Any reduction of an over-budget position. A stop may only stay put or
/// tighten; widening it would add to the risk being cut.
pub fn oversized_position(ctx: &ExitContext) -> CheckRulesResult {
    let risk = ctx.position.open_risk();
    if let ExitAction::AdjustStop { key_index, new_price } = ctx.action {
        let current = ctx.position.exit_pair(key_index).map(|p| p.stop_price);
        if current.is_some_and(|stop| ctx.direction.is_favorable(stop, new_price)) {
            return CheckRulesResult::disallow(format!(
                "stop {:.2} widens an oversized position",
                new_price
            ));
        }
    }
    if risk > ctx.settings.max_risk_per_trade {
        CheckRulesResult::allow(format!(
            "position risk ${:.2} exceeds budget ${:.2}",
            risk, ctx.settings.max_risk_per_trade
        ))
    } else {
        CheckRulesResult::disallow(format!("position risk ${:.2} within budget", risk))
    }
}

pub fn batch_overflow(ctx: &ExitContext) -> CheckRulesResult {
    let legs = ctx.position.exit_pairs.len();
    if legs > ctx.plan.batch_count {
        CheckRulesResult::allow(format!(
            "{} exit legs, more than batch count {}",
            legs, ctx.plan.batch_count
        ))
    } else {
        CheckRulesResult::disallow(format!("{} exit legs within batch count", legs))
    }
}

pub fn tighten_to_breakeven(ctx: &ExitContext) -> CheckRulesResult {
    let ExitAction::AdjustStop { key_index, new_price } = ctx.action else {
        return CheckRulesResult::disallow("not a stop adjustment");
    };
    let current = ctx.position.exit_pair(key_index).map(|p| p.stop_price);
    tighten_stop_check(
        ctx.direction,
        ctx.position,
        current,
        new_price,
        ctx.plan.allow_tighten_into_loss,
    )
}

/// Candle the incremental trailing rule measures against: the second
/// one-minute candle 2-5 minutes after open, the second five-minute candle
/// from 10 minutes on.
pub fn trailing_reference_candle(market: &MarketSnapshot) -> Option<Candle> {
    let minutes = market.minutes_since_open();
    if (2.0..=5.0).contains(&minutes) {
        market.candles.get(1).cloned()
    } else if minutes >= 10.0 {
        market.aggregated(5).get(1).cloned()
    } else {
        None
    }
}

fn no_reference(ctx: &ExitContext) -> CheckRulesResult {
    CheckRulesResult::disallow(format!(
        "no trailing reference candle at {:.1} minutes",
        ctx.market.minutes_since_open()
    ))
}

pub fn trailing_limit(ctx: &ExitContext) -> CheckRulesResult {
    let ExitAction::AdjustLimit { new_price, .. } = ctx.action else {
        return CheckRulesResult::disallow("not a limit adjustment");
    };
    let Some(reference) = trailing_reference_candle(ctx.market) else {
        return no_reference(ctx);
    };

    let extreme = reference.favorable_extreme(ctx.direction);
    if ctx.direction.is_favorable(extreme, new_price) {
        CheckRulesResult::disallow(format!(
            "limit {:.2} tighter than reference extreme {:.2}",
            new_price, extreme
        ))
    } else {
        CheckRulesResult::allow(format!(
            "limit {:.2} at or beyond reference extreme {:.2}",
            new_price, extreme
        ))
    }
}

pub fn trailing_stop(ctx: &ExitContext) -> CheckRulesResult {
    let ExitAction::AdjustStop { new_price, .. } = ctx.action else {
        return CheckRulesResult::disallow("not a stop adjustment");
    };
    let Some(reference) = trailing_reference_candle(ctx.market) else {
        return no_reference(ctx);
    };

    let extreme = reference.adverse_extreme(ctx.direction);
    if ctx.direction.is_favorable(new_price, extreme) {
        CheckRulesResult::disallow(format!(
            "stop {:.2} tighter than reference extreme {:.2}",
            new_price, extreme
        ))
    } else {
        CheckRulesResult::allow(format!(
            "stop {:.2} trails reference extreme {:.2}",
            new_price, extreme
        ))
    }
}

pub fn trailing_market_out(ctx: &ExitContext) -> CheckRulesResult {
    let Some(reference) = trailing_reference_candle(ctx.market) else {
        return no_reference(ctx);
    };

    let extreme = reference.adverse_extreme(ctx.direction);
    if ctx.direction.is_favorable(extreme, ctx.market.price) {
        CheckRulesResult::allow(format!(
            "price {:.2} through reference extreme {:.2}",
            ctx.market.price, extreme
        ))
    } else {
        CheckRulesResult::disallow(format!(
            "price {:.2} still holding reference extreme {:.2}",
            ctx.market.price, extreme
        ))
    }
}
