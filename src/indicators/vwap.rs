/// Session VWAP
///
/// Volume-weighted average of the typical price `(high + low + close) / 3`,
/// accumulated from the first candle of the slice.

use crate::models::Candle;

/// Running VWAP accumulator
#[derive(Debug, Clone, Default)]
pub struct VwapAccumulator {
    sum_pv: f64,
    sum_v: f64,
    last: Option<f64>,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a candle and return the updated VWAP
    pub fn push(&mut self, candle: &Candle) -> f64 {
        let typical = (candle.high + candle.low + candle.close) / 3.0;
        self.sum_pv += typical * candle.volume;
        self.sum_v += candle.volume;

        let vwap = if self.sum_v > 0.0 {
            self.sum_pv / self.sum_v
        } else {
            // No volume yet, fall back to the typical price
            self.last.unwrap_or(typical)
        };
        self.last = Some(vwap);
        vwap
    }

    /// VWAP including a candle that has not been folded in yet
    pub fn peek(&self, candle: &Candle) -> f64 {
        let mut copy = self.clone();
        copy.push(candle)
    }

    pub fn value(&self) -> Option<f64> {
        self.last
    }
}

/// VWAP series aligned by index with `candles`
pub fn vwap_series(candles: &[Candle]) -> Vec<f64> {
    let mut acc = VwapAccumulator::new();
    candles.iter().map(|c| acc.push(c)).collect()
}
