use crate::models::{CheckRulesResult, Direction, PositionSnapshot};

/// Stop sits on the loss side of the entry
pub fn stop_is_valid(direction: Direction, entry_price: f64, stop_price: f64) -> bool {
    entry_price.is_finite() && stop_price.is_finite() && direction.is_favorable(entry_price, stop_price)
}

/// Whether a new entry may go in given the live position.
///
/// `Ok(false)` when flat, `Ok(true)` when adding to a same-direction position
/// whose every exit stop is at or beyond breakeven, otherwise the veto reason.
pub fn added_position_eligibility(direction: Direction, position: Option<&PositionSnapshot>) -> Result<bool, String> {
    let Some(position) = position else {
        return Ok(false);
    };
    let Some(held) = position.direction() else {
        return Ok(false);
    };

    if held != direction {
        return Err(format!("opposite {} position open", held));
    }

    if position.exit_pairs.is_empty() {
        return Err("existing position has no protective stops".to_string());
    }

    let at_risk = position
        .exit_pairs
        .iter()
        .filter(|pair| direction.is_favorable(position.average_price, pair.stop_price))
        .count();
    if at_risk > 0 {
        return Err(format!(
            "existing position not at breakeven: {} stop(s) below cost {:.2}",
            at_risk, position.average_price
        ));
    }

    Ok(true)
}

/// Tighten-stop rule: moving a stop is fine once it reaches breakeven;
/// tightening while still at a loss needs the plan's explicit permission.
pub fn tighten_stop_check(
    direction: Direction,
    position: &PositionSnapshot,
    current_stop: Option<f64>,
    new_stop: f64,
    allow_tighten_into_loss: bool,
) -> CheckRulesResult {
    if !direction.is_favorable(position.average_price, new_stop) {
        return CheckRulesResult::allow(format!(
            "stop {:.2} at or beyond breakeven {:.2}",
            new_stop, position.average_price
        ));
    }

    let tightens = current_stop.map_or(false, |stop| direction.is_favorable(new_stop, stop));
    if allow_tighten_into_loss && tightens {
        return CheckRulesResult::allow("plan allows tightening into a loss");
    }

    CheckRulesResult::disallow(format!(
        "stop {:.2} would still be at a loss vs cost {:.2}",
        new_stop, position.average_price
    ))
}
