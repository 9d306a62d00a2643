/// Retest / pullback detection
///
/// Every function re-scans the closed candles it is handed (since market open
/// or since the last entry). Nothing here is incremental.
use serde::{Deserialize, Serialize};

use crate::models::{Candle, Direction, KeyLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullbackStatus {
    NotStarted,
    InProgress,
    Recovered,
}

impl std::fmt::Display for PullbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullbackStatus::NotStarted => write!(f, "not started"),
            PullbackStatus::InProgress => write!(f, "in progress"),
            PullbackStatus::Recovered => write!(f, "recovered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullbackInfo {
    pub status: PullbackStatus,
    /// Extreme of the initial push, the price a recovery must clear
    pub pivot: Option<f64>,
    /// Deepest adverse price printed during the pullback
    pub pullback_extreme: Option<f64>,
}

impl PullbackInfo {
    fn not_started() -> Self {
        Self {
            status: PullbackStatus::NotStarted,
            pivot: None,
            pullback_extreme: None,
        }
    }
}

/// Any close beyond the key level against the trade
pub fn has_lost_key_level(candles: &[Candle], direction: Direction, key_level: &KeyLevel) -> bool {
    let support = key_level.support(direction);
    candles
        .iter()
        .any(|c| direction.is_favorable(support, c.close))
}

/// Status of the first pullback after the initial push. Needs at least two
/// closed candles, otherwise "not started".
pub fn first_pullback_status(candles: &[Candle], direction: Direction) -> PullbackInfo {
    if candles.len() < 2 {
        return PullbackInfo::not_started();
    }

    let mut extreme = candles[0].favorable_extreme(direction);
    let mut pullback: Option<(f64, f64)> = None;

    for candle in &candles[1..] {
        match pullback {
            None => {
                let fav = candle.favorable_extreme(direction);
                if direction.is_favorable(fav, extreme) {
                    extreme = fav;
                } else {
                    pullback = Some((extreme, candle.adverse_extreme(direction)));
                }
            }
            Some((pivot, deepest)) => {
                if direction.is_favorable(candle.favorable_extreme(direction), pivot) {
                    return PullbackInfo {
                        status: PullbackStatus::Recovered,
                        pivot: Some(pivot),
                        pullback_extreme: Some(deepest),
                    };
                }
                pullback = Some((pivot, direction.worse(deepest, candle.adverse_extreme(direction))));
            }
        }
    }

    match pullback {
        Some((pivot, deepest)) => PullbackInfo {
            status: PullbackStatus::InProgress,
            pivot: Some(pivot),
            pullback_extreme: Some(deepest),
        },
        None => PullbackInfo::not_started(),
    }
}

/// Leg structure of a closed-candle sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveScan {
    /// Initial push plus every recovery of a pullback pivot
    pub waves: usize,
    pub in_pullback: bool,
    /// Extreme the current pullback must clear
    pub pivot: Option<f64>,
}

pub fn scan_waves(candles: &[Candle], direction: Direction) -> WaveScan {
    let Some(first) = candles.first() else {
        return WaveScan {
            waves: 0,
            in_pullback: false,
            pivot: None,
        };
    };

    let mut waves = 1;
    let mut extreme = first.favorable_extreme(direction);
    let mut in_pullback = false;

    for candle in &candles[1..] {
        let fav = candle.favorable_extreme(direction);
        if direction.is_favorable(fav, extreme) {
            if in_pullback {
                waves += 1;
                in_pullback = false;
            }
            extreme = fav;
        } else {
            in_pullback = true;
        }
    }

    WaveScan {
        waves,
        in_pullback,
        pivot: in_pullback.then_some(extreme),
    }
}

/// Price pushed at least `buffer` beyond `level` and later traded back
/// within `buffer` of it
pub fn has_retested_level(candles: &[Candle], direction: Direction, level: f64, buffer: f64) -> bool {
    let away = level + buffer * direction.sign();
    let Some(departed) = candles
        .iter()
        .position(|c| !direction.is_favorable(away, c.favorable_extreme(direction)))
    else {
        return false;
    };

    candles[departed + 1..]
        .iter()
        .any(|c| !direction.is_favorable(c.adverse_extreme(direction), away))
}

/// Latest close on the trade-favourable side of its VWAP after at least one
/// earlier close on the other side
pub fn has_reclaimed_vwap(candles: &[Candle], vwaps: &[f64], direction: Direction) -> bool {
    let n = candles.len().min(vwaps.len());
    if n < 2 {
        return false;
    }

    let last = &candles[n - 1];
    if !direction.is_favorable(last.close, vwaps[n - 1]) {
        return false;
    }

    candles[..n - 1]
        .iter()
        .zip(&vwaps[..n - 1])
        .any(|(c, vwap)| direction.is_favorable(*vwap, c.close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::create_test_candles;

    #[test]
    fn test_has_lost_key_level() {
        let kl = KeyLevel::new(101.0, 100.0);
        let holding = create_test_candles(&[(101.0, 102.0, 100.2, 101.5), (101.5, 102.5, 100.5, 102.0)]);
        assert!(!has_lost_key_level(&holding, Direction::Long, &kl));

        let lost = create_test_candles(&[(101.0, 102.0, 100.2, 101.5), (101.5, 101.6, 99.0, 99.5)]);
        assert!(has_lost_key_level(&lost, Direction::Long, &kl));
        // Short side uses the band high
        assert!(has_lost_key_level(&holding, Direction::Short, &kl));
    }

    #[test]
    fn test_first_pullback_needs_two_candles() {
        let one = create_test_candles(&[(100.0, 101.0, 99.0, 100.5)]);
        let info = first_pullback_status(&one, Direction::Long);
        assert_eq!(info.status, PullbackStatus::NotStarted);
        assert!(info.pivot.is_none());
    }

    #[test]
    fn test_first_pullback_in_progress_then_recovered() {
        let candles = create_test_candles(&[
            (100.0, 101.0, 99.8, 100.8),
            (100.8, 102.0, 100.5, 101.8),
            (101.8, 101.9, 100.9, 101.0),
            (101.0, 101.5, 100.7, 101.4),
        ]);
        let info = first_pullback_status(&candles, Direction::Long);
        assert_eq!(info.status, PullbackStatus::InProgress);
        assert_eq!(info.pivot, Some(102.0));
        assert_eq!(info.pullback_extreme, Some(100.7));

        let mut recovered = candles.clone();
        recovered.extend(create_test_candles(&[(101.4, 102.3, 101.3, 102.2)]));
        let info = first_pullback_status(&recovered, Direction::Long);
        assert_eq!(info.status, PullbackStatus::Recovered);
        assert_eq!(info.status.to_string(), "recovered");
    }

    #[test]
    fn test_scan_waves_short() {
        let candles = create_test_candles(&[
            (100.0, 100.2, 99.0, 99.2),
            (99.2, 99.6, 98.5, 98.6),
            (98.6, 99.4, 98.7, 99.2),
            (99.2, 99.3, 98.0, 98.1),
            (98.1, 98.9, 98.3, 98.8),
        ]);
        let scan = scan_waves(&candles, Direction::Short);
        assert_eq!(scan.waves, 2);
        assert!(scan.in_pullback);
        assert_eq!(scan.pivot, Some(98.0));
        assert_eq!(scan_waves(&[], Direction::Short).waves, 0);
    }

    #[test]
    fn test_has_retested_level() {
        let candles = create_test_candles(&[
            (100.0, 100.3, 99.9, 100.2),
            (100.2, 101.2, 100.1, 101.0),
            (101.0, 101.1, 100.4, 100.5),
        ]);
        assert!(has_retested_level(&candles, Direction::Long, 100.0, 0.5));
        // Never pushed a full dollar away
        assert!(!has_retested_level(&candles, Direction::Long, 100.0, 1.5));
    }

    #[test]
    fn test_has_reclaimed_vwap() {
        let candles = create_test_candles(&[
            (100.0, 100.2, 99.0, 99.2),
            (99.2, 100.6, 99.1, 100.5),
        ]);
        let vwaps = vec![99.8, 99.9];
        assert!(has_reclaimed_vwap(&candles, &vwaps, Direction::Long));
        assert!(!has_reclaimed_vwap(&candles, &vwaps, Direction::Short));
        assert!(!has_reclaimed_vwap(&candles[..1], &vwaps[..1], Direction::Long));
    }
}
