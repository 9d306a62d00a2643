use crate::models::BasePlan;

/// Reason entries are blocked at `minutes_since_open`, if they are
pub fn blocked_by_timing(minutes_since_open: f64, plan: &BasePlan) -> Option<String> {
    if minutes_since_open < 0.0 {
        return Some("market not open yet".to_string());
    }

    if let Some(defer) = plan.defer_minutes {
        if minutes_since_open < defer {
            return Some(format!(
                "entries deferred until {:.0} minutes after open ({:.1} elapsed)",
                defer, minutes_since_open
            ));
        }
    }

    if let Some(stop) = plan.stop_trading_minutes {
        if minutes_since_open >= stop {
            return Some(format!(
                "trading window closed {:.0} minutes after open",
                stop
            ));
        }
    }

    None
}

/// Entries priced strictly inside the day's range are capped to half size
/// once `after_minutes` have passed; extremes and early entries keep full size.
pub fn mid_range_cap(
    minutes_since_open: f64,
    after_minutes: f64,
    entry_price: f64,
    high_of_day: Option<f64>,
    low_of_day: Option<f64>,
) -> f64 {
    if minutes_since_open < after_minutes {
        return 1.0;
    }

    match (high_of_day, low_of_day) {
        (Some(high), Some(low)) if entry_price < high && entry_price > low => 0.5,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_not_open() {
        let plan = BasePlan::default();
        assert_eq!(
            blocked_by_timing(-1.0, &plan).as_deref(),
            Some("market not open yet")
        );
    }

    #[test]
    fn test_defer_and_stop_windows() {
        let plan = BasePlan {
            defer_minutes: Some(5.0),
            stop_trading_minutes: Some(60.0),
            ..Default::default()
        };
        assert!(blocked_by_timing(4.9, &plan).unwrap().starts_with("entries deferred"));
        assert!(blocked_by_timing(5.0, &plan).is_none());
        assert!(blocked_by_timing(59.9, &plan).is_none());
        assert!(blocked_by_timing(60.0, &plan).unwrap().starts_with("trading window closed"));
    }

    #[test]
    fn test_mid_range_cap() {
        // Before the cutoff always full size
        assert_eq!(mid_range_cap(9.0, 10.0, 100.0, Some(101.0), Some(99.0)), 1.0);
        // Inside the range after the cutoff
        assert_eq!(mid_range_cap(10.0, 10.0, 100.0, Some(101.0), Some(99.0)), 0.5);
        // At the high is a breakout, not mid-range
        assert_eq!(mid_range_cap(12.0, 10.0, 101.0, Some(101.0), Some(99.0)), 1.0);
        assert_eq!(mid_range_cap(12.0, 10.0, 100.0, None, None), 1.0);
    }
}
