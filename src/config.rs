use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One step of the liquidity ladder: at or above `min_dollar_volume`
/// traded since open, entries are scaled by `scale`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LiquidityTier {
    pub min_dollar_volume: f64,
    pub scale: f64,
}

/// Session-wide engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Flag every order instruction as dry-run
    pub dry_run: bool,
    /// Realized loss (positive dollars) that halts new entries for the day
    pub daily_max_loss: f64,
    pub max_daily_entries: Option<u32>,
    /// Dollar risk budget per position
    pub max_risk_per_trade: f64,
    pub liquidity_tiers: Vec<LiquidityTier>,
    pub min_volume_shares: f64,
    pub mid_range_minutes: f64,
    /// Minutes since open after which every exit request is allowed
    pub exit_override_minutes: f64,
    pub max_spread_atr_ratio: f64,
    pub near_level_atr_ratio: f64,
    pub max_entry_distance_atr_ratio: f64,
    pub recheck_delay_ms: i64,
    pub max_rechecks: u32,
    /// Double the recheck delay on every attempt instead of a fixed interval
    pub recheck_backoff: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dry_run: true,
            daily_max_loss: 500.0,
            max_daily_entries: None,
            max_risk_per_trade: 100.0,
            liquidity_tiers: vec![
                LiquidityTier {
                    min_dollar_volume: 0.0,
                    scale: 0.0,
                },
                LiquidityTier {
                    min_dollar_volume: 500_000.0,
                    scale: 0.5,
                },
                LiquidityTier {
                    min_dollar_volume: 2_000_000.0,
                    scale: 1.0,
                },
            ],
            min_volume_shares: 150_000.0,
            mid_range_minutes: 10.0,
            exit_override_minutes: 15.0,
            max_spread_atr_ratio: 0.1,
            near_level_atr_ratio: 0.1,
            max_entry_distance_atr_ratio: 0.2,
            recheck_delay_ms: 400,
            max_rechecks: 3,
            recheck_backoff: false,
        }
    }
}

impl EngineSettings {
    /// Load settings from an optional file, overlaid with `DAYTRADER__*`
    /// environment variables (e.g. `DAYTRADER__DAILY_MAX_LOSS=250`).
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("DAYTRADER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<EngineSettings>()?;

        tracing::debug!("Engine settings: {:?}", settings);
        Ok(settings)
    }
}
