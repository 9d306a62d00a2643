use crate::models::plan::ladder_rung;
use crate::models::{AtrInfo, Direction, ExitTargetSet};

/// Minimum profit (in price units) for partial exit slot `batch_index`.
///
/// Candidates:
/// - risk x RRR rung
/// - ATR daily range x ratio rung, minus risk
/// - distance from entry to the configured price level (if any)
///
/// The smallest candidate wins. With `apply_min_atr` the result is clamped up
/// to `atr.minimum() x ratio rung`. None when no ladder yields a candidate.
pub fn minimum_profit_target(
    batch_index: usize,
    entry_price: f64,
    stop_price: f64,
    atr: &AtrInfo,
    targets: &ExitTargetSet,
) -> Option<f64> {
    let risk = (entry_price - stop_price).abs();
    let direction = if entry_price >= stop_price {
        Direction::Long
    } else {
        Direction::Short
    };

    let daily_range_rung = ladder_rung(&targets.daily_range, batch_index);

    let candidates = [
        ladder_rung(&targets.rrr, batch_index).map(|rrr| risk * rrr),
        daily_range_rung.map(|ratio| atr.average * ratio - risk),
        ladder_rung(&targets.price_levels, batch_index)
            .map(|level| (level - entry_price) * direction.sign()),
    ];

    let minimum = candidates.into_iter().flatten().reduce(f64::min)?;

    if targets.apply_min_atr {
        if let Some(ratio) = daily_range_rung {
            return Some(minimum.max(atr.minimum() * ratio));
        }
    }

    Some(minimum)
}

/// Target price for every slot of a `batch_count` exit ladder
pub fn target_prices(
    direction: Direction,
    entry_price: f64,
    stop_price: f64,
    atr: &AtrInfo,
    targets: &ExitTargetSet,
    batch_count: usize,
) -> Vec<f64> {
    (0..batch_count)
        .filter_map(|i| minimum_profit_target(i, entry_price, stop_price, atr, targets))
        .map(|profit| entry_price + profit * direction.sign())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimum_of_candidates() {
        let atr = AtrInfo::new(4.0);
        let targets = ExitTargetSet::default();

        // rrr: 2 * 0.85 = 1.7, daily range: 4 * 0.4 - 2 = -0.4
        let profit = minimum_profit_target(0, 100.0, 98.0, &atr, &targets).unwrap();
        assert_relative_eq!(profit, -0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_min_atr_floor() {
        let atr = AtrInfo::new(4.0);
        let targets = ExitTargetSet {
            apply_min_atr: true,
            ..Default::default()
        };

        // floor = 4 * 0.5 * 0.4 = 0.8
        let profit = minimum_profit_target(0, 100.0, 98.0, &atr, &targets).unwrap();
        assert_relative_eq!(profit, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_price_level_candidate_short() {
        let atr = AtrInfo::new(10.0);
        let targets = ExitTargetSet {
            rrr: vec![3.0],
            daily_range: vec![1.0],
            price_levels: vec![99.0],
            apply_min_atr: false,
        };

        // Short from 100 stop 101: rrr 3.0, range 9.0, level 1.0
        let profit = minimum_profit_target(0, 100.0, 101.0, &atr, &targets).unwrap();
        assert_relative_eq!(profit, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ladder_index_past_end_reuses_last_rung() {
        let atr = AtrInfo::new(100.0);
        let targets = ExitTargetSet {
            rrr: vec![1.0, 2.0],
            daily_range: Vec::new(),
            price_levels: Vec::new(),
            apply_min_atr: false,
        };
        let profit = minimum_profit_target(7, 100.0, 99.0, &atr, &targets).unwrap();
        assert_relative_eq!(profit, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_candidates() {
        let targets = ExitTargetSet {
            rrr: Vec::new(),
            daily_range: Vec::new(),
            price_levels: Vec::new(),
            apply_min_atr: true,
        };
        assert!(minimum_profit_target(0, 100.0, 99.0, &AtrInfo::new(1.0), &targets).is_none());
    }

    #[test]
    fn test_target_prices() {
        let atr = AtrInfo::new(10.0);
        let targets = ExitTargetSet {
            rrr: vec![1.0, 2.0],
            daily_range: Vec::new(),
            price_levels: Vec::new(),
            apply_min_atr: false,
        };
        let prices = target_prices(Direction::Short, 50.0, 51.0, &atr, &targets, 3);
        assert_eq!(prices.len(), 3);
        assert_relative_eq!(prices[0], 49.0, epsilon = 1e-9);
        assert_relative_eq!(prices[2], 48.0, epsilon = 1e-9);
    }
}
