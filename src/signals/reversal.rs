/// Reversal bar classification
///
/// A reversal bar rejects the prevailing momentum. For a long check (momentum
/// up) that means a bar that closes well off its high; short checks mirror.
///
/// Strict:     bar colored against momentum AND
///             (retrace from the extreme / range > 0.45 OR trailing wick / range > 0.32)
/// Non-strict: strict OR colored against momentum OR either wick / range > 0.33
///
/// A zero-range bar is never a reversal.
use crate::models::{Candle, Direction};

const STRICT_RETRACE_RATIO: f64 = 0.45;
const STRICT_WICK_RATIO: f64 = 0.32;
const LOOSE_WICK_RATIO: f64 = 0.33;

pub fn is_reversal_bar(bar: &Candle, momentum: Direction, strict: bool) -> bool {
    let range = bar.range();
    if range <= 0.0 {
        return false;
    }

    let (against_color, retrace, trailing_wick) = match momentum {
        Direction::Long => (bar.is_red(), bar.high - bar.close, bar.top_wick()),
        Direction::Short => (bar.is_green(), bar.close - bar.low, bar.bottom_wick()),
    };

    let strict_match = against_color
        && (retrace / range > STRICT_RETRACE_RATIO || trailing_wick / range > STRICT_WICK_RATIO);
    if strict || strict_match {
        return strict_match;
    }

    against_color
        || bar.top_wick() / range > LOOSE_WICK_RATIO
        || bar.bottom_wick() / range > LOOSE_WICK_RATIO
}

/// Most recent closed bar that rejects `momentum`, with its index
pub fn last_reversal_bar(candles: &[Candle], momentum: Direction, strict: bool) -> Option<(usize, &Candle)> {
    candles
        .iter()
        .enumerate()
        .rev()
        .find(|(_, bar)| is_reversal_bar(bar, momentum, strict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "TEST".to_string(),
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_red_bar_closing_off_high_is_strict_reversal() {
        let candle = bar(10.0, 10.5, 9.0, 9.1);
        assert!(is_reversal_bar(&candle, Direction::Long, true));
        assert!(is_reversal_bar(&candle, Direction::Long, false));
    }

    #[test]
    fn test_top_wick_only_counts_when_not_strict() {
        // range 0.15, top wick 0.05 -> 0.333
        let candle = bar(10.0, 10.1, 9.95, 10.05);
        assert!(is_reversal_bar(&candle, Direction::Long, false));
        assert!(!is_reversal_bar(&candle, Direction::Long, true));
    }

    #[test]
    fn test_zero_range_is_not_reversal() {
        let candle = bar(10.0, 10.0, 10.0, 10.0);
        assert!(!is_reversal_bar(&candle, Direction::Long, false));
        assert!(!is_reversal_bar(&candle, Direction::Short, true));
    }

    #[test]
    fn test_non_positive_range_is_never_reversal() {
        // Flat and inverted bars, both directions, both modes
        for candle in [bar(10.0, 10.0, 10.0, 10.0), bar(10.0, 9.9, 10.1, 10.0)] {
            for momentum in [Direction::Long, Direction::Short] {
                assert!(!is_reversal_bar(&candle, momentum, true));
                assert!(!is_reversal_bar(&candle, momentum, false));
            }
        }
        let flat = vec![bar(10.0, 10.0, 10.0, 10.0); 3];
        assert!(last_reversal_bar(&flat, Direction::Long, false).is_none());
    }

    #[test]
    fn test_short_mirror() {
        // Green bar closing well off the low rejects downside momentum
        let candle = bar(9.0, 10.5, 8.5, 10.4);
        assert!(is_reversal_bar(&candle, Direction::Short, true));
        assert!(!is_reversal_bar(&candle, Direction::Long, true));
    }

    #[test]
    fn test_strong_trend_bar_is_not_reversal() {
        // Full-bodied green bar, no wicks
        let candle = bar(10.0, 11.0, 10.0, 11.0);
        assert!(!is_reversal_bar(&candle, Direction::Long, false));
    }

    #[test]
    fn test_last_reversal_bar() {
        let candles = vec![
            bar(10.0, 11.0, 10.0, 11.0),
            bar(11.0, 11.5, 10.2, 10.3),
            bar(10.3, 11.3, 10.3, 11.3),
        ];
        let (idx, found) = last_reversal_bar(&candles, Direction::Long, true).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(found.close, 10.3);
        assert!(last_reversal_bar(&candles[..1], Direction::Long, true).is_none());
    }
}
