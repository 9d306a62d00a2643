/// Admission pipeline
///
/// Turns one entry attempt into a size fraction in [0, 1]. Hard vetoes run
/// first, in a fixed order, and any of them returns 0. The survivor starts at
/// liquidity scale x risk sizing. A mid-range entry late in the session is
/// capped at half size, then each other soft reducer that triggers halves
/// the running size, so reducers compound.
use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::market::MarketSnapshot;
use crate::models::{AccountSnapshot, BasePlan, Direction, DirectionalPlan, OrderType};
use crate::risk::{
    added_position_eligibility, blocked_by_timing, entry_too_far, in_no_trade_zone, liquidity_scale,
    mid_range_cap, minimum_volume_met, near_against_vwap, near_against_watch_level,
    outside_tradable_areas, risk_sizing_for_next_entry, spread_too_wide, stop_is_valid,
    vwap_distance_veto, CircuitBreakers,
};

const REDUCER: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub order_type: OrderType,
    /// Veto entries priced too far from the current price
    pub check_entry_distance: bool,
    /// Requesting tradebook or "manual", for log context
    pub source: String,
}

impl EntryRequest {
    pub fn tag(&self) -> String {
        format!("{} {} {}", self.symbol, self.direction, self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionDecision {
    pub size: f64,
    pub veto: Option<String>,
    /// Reasons of every soft reducer that fired, in order
    pub reductions: Vec<String>,
    pub adding: bool,
}

impl AdmissionDecision {
    fn vetoed(reason: String) -> Self {
        Self {
            size: 0.0,
            veto: Some(reason),
            reductions: Vec::new(),
            adding: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.size > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionPipeline {
    settings: EngineSettings,
    breakers: CircuitBreakers,
}

impl AdmissionPipeline {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            settings: settings.clone(),
            breakers: CircuitBreakers::from_settings(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Allowed size fraction for `request`
    pub fn evaluate(
        &self,
        request: &EntryRequest,
        plan: &BasePlan,
        side: &DirectionalPlan,
        market: &MarketSnapshot,
        account: &AccountSnapshot,
    ) -> AdmissionDecision {
        let scale = liquidity_scale(market.dollar_volume_since_open(), &self.settings.liquidity_tiers);

        let adding = match self.hard_veto(request, plan, side, market, account, scale) {
            Ok(adding) => adding,
            Err(reason) => {
                tracing::info!("[{}] entry vetoed: {}", request.tag(), reason);
                return AdmissionDecision::vetoed(reason);
            }
        };

        let initial = scale * risk_sizing_for_next_entry(plan.setup_quality, adding);
        let (size, reductions) = self.apply_reducers(initial, request, side, market);
        let size = size.clamp(0.0, 1.0);

        tracing::info!(
            "[{}] entry admitted at size {:.3} (initial {:.3}, {} reducer(s))",
            request.tag(),
            size,
            initial,
            reductions.len()
        );

        AdmissionDecision {
            size,
            veto: None,
            reductions,
            adding,
        }
    }

    /// First hard veto in priority order, or whether the entry adds to a position
    fn hard_veto(
        &self,
        request: &EntryRequest,
        plan: &BasePlan,
        side: &DirectionalPlan,
        market: &MarketSnapshot,
        account: &AccountSnapshot,
        scale: f64,
    ) -> Result<bool, String> {
        let direction = request.direction;
        let entry = request.entry_price;
        let atr = market.atr.average;

        if !stop_is_valid(direction, entry, request.stop_price) {
            return Err(format!(
                "invalid stop {:.2} for {} entry at {:.2}",
                request.stop_price, direction, entry
            ));
        }

        self.breakers.check(account).map_err(|trip| trip.to_string())?;

        let adding = added_position_eligibility(direction, account.position(&request.symbol))?;

        if account.has_pending_entry(&request.symbol, direction) {
            return Err("entry order already pending".to_string());
        }

        if scale <= 0.0 {
            return Err(format!(
                "insufficient liquidity: ${:.0} traded since open",
                market.dollar_volume_since_open()
            ));
        }

        if let Some(reason) = blocked_by_timing(market.minutes_since_open(), plan) {
            return Err(reason);
        }

        if let Some(zone) = in_no_trade_zone(entry, &side.no_trade_zones) {
            return Err(format!(
                "entry {:.2} inside no-trade zone {:.2}-{:.2}",
                entry, zone.low, zone.high
            ));
        }

        if spread_too_wide(market.spread, atr, self.settings.max_spread_atr_ratio) {
            return Err(format!(
                "spread {:.3} wider than {:.0}% of ATR {:.2}",
                market.spread,
                self.settings.max_spread_atr_ratio * 100.0,
                atr
            ));
        }

        if request.check_entry_distance
            && entry_too_far(entry, market.price, self.settings.max_entry_distance_atr_ratio * atr)
        {
            return Err(format!(
                "entry {:.2} too far from price {:.2}",
                entry, market.price
            ));
        }

        if let Some(vwap) = market.latest_vwap() {
            if let Some(reason) = vwap_distance_veto(direction, entry, request.stop_price, vwap) {
                return Err(reason);
            }
        }

        Ok(adding)
    }

    fn apply_reducers(
        &self,
        initial: f64,
        request: &EntryRequest,
        side: &DirectionalPlan,
        market: &MarketSnapshot,
    ) -> (f64, Vec<String>) {
        let direction = request.direction;
        let entry = request.entry_price;
        let buffer = self.settings.near_level_atr_ratio * market.atr.average;

        let mut size = initial;
        let mut reductions = Vec::new();

        let cap = mid_range_cap(
            market.minutes_since_open(),
            self.settings.mid_range_minutes,
            entry,
            market.high_of_day(),
            market.low_of_day(),
        );
        if cap < size {
            size = cap;
            reductions.push(format!("mid-range entry {:.2} capped at {:.2}", entry, cap));
        }

        if outside_tradable_areas(entry, &side.tradable_areas) {
            size *= REDUCER;
            reductions.push("outside tradable areas".to_string());
        }

        if let Some(level) = near_against_watch_level(direction, entry, &side.watch_levels, buffer) {
            size *= REDUCER;
            reductions.push(format!("watch level {:.2} ahead", level));
        }

        if let Some(vwap) = market.latest_vwap() {
            if near_against_vwap(direction, entry, vwap, buffer) {
                size *= REDUCER;
                reductions.push(format!("vwap {:.2} ahead", vwap));
            }
        }

        if !minimum_volume_met(&market.candles, self.settings.min_volume_shares) {
            size *= REDUCER;
            reductions.push(format!(
                "volume since peak below {:.0} shares",
                self.settings.min_volume_shares
            ));
        }

        for reason in &reductions {
            tracing::debug!("[{}] size reduced: {}", request.tag(), reason);
        }

        (size, reductions)
    }
}
