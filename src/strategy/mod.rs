// Tradebooks: one strategy-variant state machine per symbol + direction
pub mod advisory;
pub mod state;
pub mod variants;

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::{AdmissionPipeline, CancellationToken, EntryRequest, ExitContext, OrderGateway};
use crate::market::MarketSnapshot;
use crate::models::{
    AccountSnapshot, CheckRulesResult, Direction, EntryInstruction, KeyLevel, PositionSnapshot, StrategyKind,
    TradingPlan,
};
use crate::signals::{has_lost_key_level, has_reclaimed_vwap, is_with_vwap, scan_waves, target_prices};

pub use advisory::{AdvisorySink, Callout, CalloutLog, TracingAdvisor};
pub use state::{StateTransition, TradebookState};
pub use variants::{
    disallowed_reason_for_single_level_momentum, variant_spec, EntrySetup, Levels, Machine, Trigger, VariantSpec,
};

/// Identity of one trigger: the closed candle it fired on and its stop.
/// Stops come from candles and levels, never from the live price, so a
/// tick between two deliveries of the same close keeps the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub candle_index: usize,
    stop_bits: u64,
}

impl SubmissionKey {
    pub fn new(candle_index: usize, stop_price: f64) -> Self {
        Self {
            candle_index,
            stop_bits: stop_price.to_bits(),
        }
    }
}

/// Market and account context for one entry attempt
pub struct TradeEnv<'a> {
    pub market: &'a MarketSnapshot,
    pub account: &'a AccountSnapshot,
    pub plan: &'a TradingPlan,
    pub admission: &'a AdmissionPipeline,
}

#[derive(Debug, Clone)]
pub struct Tradebook {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub kind: StrategyKind,
    pub key_level: KeyLevel,
    state: TradebookState,
    enabled: bool,
    stopped: bool,
    manual_control: bool,
    leg_count: u32,
    /// Leg an entry was already submitted on
    entered_leg: Option<u32>,
    entry_pivot: Option<f64>,
    submitted: HashSet<SubmissionKey>,
    pending_recheck: Option<CancellationToken>,
}

impl Tradebook {
    /// Fails when the variant cannot trade `direction`
    pub fn new(symbol: &str, direction: Direction, kind: StrategyKind, key_level: KeyLevel) -> Result<Self, EngineError> {
        let spec = variant_spec(kind);
        if let Some(allowed) = spec.allowed_direction {
            if allowed != direction {
                return Err(EngineError::WrongDirection {
                    kind,
                    direction,
                    allowed,
                });
            }
        }

        Ok(Self {
            id: format!("{}-{}-{}", symbol, direction, kind),
            symbol: symbol.to_string(),
            direction,
            kind,
            key_level,
            state: TradebookState::Observing,
            enabled: spec.enable_by_default,
            stopped: false,
            manual_control: false,
            leg_count: 0,
            entered_leg: None,
            entry_pivot: None,
            submitted: HashSet::new(),
            pending_recheck: None,
        })
    }

    pub fn spec(&self) -> VariantSpec {
        variant_spec(self.kind)
    }

    pub fn state(&self) -> TradebookState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Selector hook; a stopped tradebook stays off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn manual_control(&self) -> bool {
        self.manual_control
    }

    pub fn set_manual_control(&mut self, manual: bool) {
        self.manual_control = manual;
    }

    pub fn leg_count(&self) -> u32 {
        self.leg_count
    }

    pub fn entered_leg(&self) -> Option<u32> {
        self.entered_leg
    }

    /// Risk level of the last submitted entry
    pub fn entry_pivot(&self) -> Option<f64> {
        self.entry_pivot
    }

    pub fn levels(&self, market: &MarketSnapshot) -> Option<Levels> {
        (self.spec().levels)(self, market)
    }

    fn tag(&self) -> String {
        format!("{} {} {}", self.symbol, self.direction, self.kind)
    }

    /// Move to `next`. Re-entering the current state does nothing; any real
    /// change emits exactly one callout.
    pub fn transition_to_state(
        &mut self,
        next: TradebookState,
        market: &MarketSnapshot,
        sink: &mut dyn AdvisorySink,
    ) -> Option<StateTransition> {
        if next == self.state {
            return None;
        }

        let from = self.state;
        self.state = next;
        if next.starts_leg() {
            self.leg_count += 1;
        } else if next == TradebookState::Observing {
            self.leg_count = 0;
            self.entered_leg = None;
        }

        tracing::info!("[{}] {} -> {}", self.tag(), from, next);
        sink.callout(
            &self.symbol,
            &format!("{} {} {}", self.kind, self.direction, next),
        );

        Some(StateTransition {
            tradebook_id: self.id.clone(),
            from,
            to: next,
            timestamp: market.now,
        })
    }

    /// Advance the state machine on a closed candle
    pub fn update(
        &mut self,
        market: &MarketSnapshot,
        position: Option<&PositionSnapshot>,
        sink: &mut dyn AdvisorySink,
    ) -> Option<StateTransition> {
        let flat = position.map_or(true, |p| p.direction() != Some(self.direction));
        if self.state.is_terminal() {
            if flat {
                return self.transition_to_state(TradebookState::Observing, market, sink);
            }
            return None;
        }

        let next = match self.spec().machine {
            Machine::Momentum => self.next_momentum_state(market),
            Machine::Vwap => self.next_vwap_state(market),
        }?;
        self.transition_to_state(next, market, sink)
    }

    fn next_momentum_state(&self, market: &MarketSnapshot) -> Option<TradebookState> {
        let levels = self.levels(market)?;
        let last = market.last_closed()?;
        let d = self.direction;
        let lost = has_lost_key_level(std::slice::from_ref(last), d, &KeyLevel::single(levels.failure));

        match self.state {
            TradebookState::Observing if d.is_favorable(last.close, levels.momentum) => Some(TradebookState::Momentum),
            TradebookState::Momentum | TradebookState::Pullback if lost => Some(TradebookState::Failed),
            TradebookState::Momentum | TradebookState::Pullback => {
                // Legs are counted from the first close beyond the momentum level
                let start = market
                    .candles
                    .iter()
                    .position(|c| d.is_favorable(c.close, levels.momentum))?;
                let scan = scan_waves(&market.candles[start..], d);
                if scan.in_pullback {
                    Some(TradebookState::Pullback)
                } else {
                    Some(TradebookState::Momentum)
                }
            }
            _ => None,
        }
    }

    fn next_vwap_state(&self, market: &MarketSnapshot) -> Option<TradebookState> {
        let n = market.candles.len().min(market.vwaps.len());
        if n < 2 {
            return None;
        }
        let d = self.direction;
        let (prev, last) = (&market.candles[n - 2], &market.candles[n - 1]);
        let (prev_vwap, vwap) = (market.vwaps[n - 2], market.vwaps[n - 1]);

        match self.state {
            TradebookState::Observing => {
                let crossed = is_with_vwap(d, last.close, vwap) && !is_with_vwap(d, prev.close, prev_vwap);
                crossed.then_some(TradebookState::LostVwap)
            }
            TradebookState::LostVwap | TradebookState::Bounce | TradebookState::LegDown => {
                // Reclaimed from the other side of the trade
                if has_reclaimed_vwap(&market.candles[..n], &market.vwaps[..n], d.opposite()) {
                    Some(TradebookState::ReclaimedVwap)
                } else if d.is_favorable(last.favorable_extreme(d), prev.favorable_extreme(d)) {
                    Some(TradebookState::LegDown)
                } else {
                    Some(TradebookState::Bounce)
                }
            }
            _ => None,
        }
    }

    /// Variant entry trigger; disabled or stopped books always hold
    pub fn evaluate_trigger(&self, market: &MarketSnapshot, recheck: bool) -> Trigger {
        if !self.is_enabled() {
            return Trigger::Hold;
        }
        (self.spec().trigger)(self, market, recheck)
    }

    /// Submit one entry through admission. Returns the admitted size; 0 when
    /// vetoed or when this trigger already went out.
    pub fn trigger_entry(&mut self, setup: EntrySetup, env: &TradeEnv, gateway: &mut dyn OrderGateway) -> f64 {
        let key = SubmissionKey::new(env.market.candles.len(), setup.stop_price);
        if self.submitted.contains(&key) {
            tracing::debug!("[{}] duplicate entry for candle {} ignored", self.tag(), key.candle_index);
            return 0.0;
        }

        let request = EntryRequest {
            symbol: self.symbol.clone(),
            direction: self.direction,
            entry_price: setup.entry_price,
            stop_price: setup.stop_price,
            order_type: setup.order_type,
            check_entry_distance: false,
            source: self.kind.to_string(),
        };
        let plan = env.plan.plan_for(self.direction, self.kind);
        let side = env.plan.side(self.direction);

        let decision = env.admission.evaluate(&request, plan, side, env.market, env.account);
        if !decision.is_allowed() {
            return 0.0;
        }

        let instruction = EntryInstruction {
            id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            direction: self.direction,
            order_type: setup.order_type,
            price: setup.entry_price,
            stop_price: setup.stop_price,
            risk_level_price: setup.risk_level_price,
            size: decision.size,
            target_prices: target_prices(
                self.direction,
                setup.entry_price,
                setup.stop_price,
                &env.market.atr,
                &plan.targets,
                plan.batch_count,
            ),
            plan: plan.clone(),
            tradebook_id: self.id.clone(),
            dry_run: env.admission.settings().dry_run,
        };

        self.submitted.insert(key);
        self.entered_leg = Some(self.leg_count);
        self.entry_pivot = Some(setup.risk_level_price);
        gateway.submit_entry(instruction);
        decision.size
    }

    /// Strategy stage of exit adjudication
    pub fn exit_predicate(&self, ctx: &ExitContext) -> CheckRulesResult {
        (self.spec().exit_predicate)(self, ctx)
    }

    pub fn has_pending_recheck(&self) -> bool {
        self.pending_recheck
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn set_pending_recheck(&mut self, token: CancellationToken) {
        if let Some(old) = self.pending_recheck.replace(token) {
            old.cancel();
        }
    }

    pub fn cancel_recheck(&mut self) {
        if let Some(token) = self.pending_recheck.take() {
            token.cancel();
        }
    }

    /// Reset to a fresh Observing book, cancelling any pending recheck and
    /// forgetting past submissions
    pub fn clear_state(&mut self) {
        self.cancel_recheck();
        self.state = TradebookState::Observing;
        self.leg_count = 0;
        self.entered_leg = None;
        self.entry_pivot = None;
        self.submitted.clear();
    }

    /// Operator stop: clear state and keep the book off for the session
    pub fn stop(&mut self) {
        self.clear_state();
        self.stopped = true;
    }

    pub fn live_stats(&self) -> String {
        let status = if self.stopped {
            "stopped"
        } else if self.enabled {
            "on"
        } else {
            "off"
        };
        format!("{} {} [{}] {} legs {}", self.kind, self.direction, status, self.state, self.leg_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::execution::RecordingGateway;
    use crate::market::test_support::{create_test_candles, snapshot_with};
    use crate::models::AtrInfo;

    fn book(kind: StrategyKind, direction: Direction) -> Tradebook {
        let mut book = Tradebook::new("TEST", direction, kind, KeyLevel::new(101.0, 100.0)).unwrap();
        book.set_enabled(true);
        book
    }

    fn liquid(prices: &[(f64, f64, f64, f64)], vwap: f64) -> MarketSnapshot {
        snapshot_with(create_test_candles(prices), vwap)
    }

    #[test]
    fn test_wrong_direction_is_construction_error() {
        let err = Tradebook::new("TEST", Direction::Short, StrategyKind::AboveWaterBreakout, KeyLevel::single(1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::WrongDirection { .. }));
        assert!(Tradebook::new("TEST", Direction::Short, StrategyKind::OpenFlush, KeyLevel::single(1.0)).is_err());
        assert!(Tradebook::new("TEST", Direction::Long, StrategyKind::BelowWaterBreakdown, KeyLevel::single(1.0)).is_err());
    }

    #[test]
    fn test_transition_is_idempotent() {
        let mut book = book(StrategyKind::AboveWaterBreakout, Direction::Long);
        let market = liquid(&[(100.0, 100.5, 99.5, 100.2)], 99.0);
        let mut log = CalloutLog::new();

        assert!(book
            .transition_to_state(TradebookState::Momentum, &market, &mut log)
            .is_some());
        assert!(book
            .transition_to_state(TradebookState::Momentum, &market, &mut log)
            .is_none());
        assert_eq!(log.count_for("TEST"), 1);
        assert_eq!(book.leg_count(), 1);
    }

    #[test]
    fn test_breakout_momentum_pullback_failed() {
        let mut book = book(StrategyKind::AboveWaterBreakout, Direction::Long);
        let mut log = CalloutLog::new();
        let mut prices = vec![(100.0, 100.8, 99.8, 100.5)];

        // Close above the band high
        prices.push((100.5, 101.6, 100.4, 101.5));
        book.update(&liquid(&prices, 99.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::Momentum);

        // Fails to extend
        prices.push((101.5, 101.55, 101.0, 101.2));
        book.update(&liquid(&prices, 99.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::Pullback);

        // Closes under the band low
        prices.push((101.2, 101.3, 99.5, 99.7));
        book.update(&liquid(&prices, 99.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::Failed);

        // Flat: back to observing
        book.update(&liquid(&prices, 99.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::Observing);
        assert_eq!(log.count_for("TEST"), 4);
    }

    #[test]
    fn test_terminal_state_held_while_position_open() {
        let mut book = book(StrategyKind::AboveWaterBreakout, Direction::Long);
        let market = liquid(&[(100.0, 100.5, 99.5, 100.2)], 99.0);
        let mut log = CalloutLog::new();
        book.transition_to_state(TradebookState::Failed, &market, &mut log);

        let position = PositionSnapshot {
            symbol: "TEST".to_string(),
            quantity: 100,
            average_price: 100.0,
            exit_pairs: Vec::new(),
            tradebook_id: Some(book.id.clone()),
        };
        assert!(book.update(&market, Some(&position), &mut log).is_none());
        assert_eq!(book.state(), TradebookState::Failed);
    }

    #[test]
    fn test_vwap_machine() {
        let mut book = book(StrategyKind::VwapContinuationFailed, Direction::Short);
        let mut log = CalloutLog::new();
        let mut prices = vec![(100.5, 100.8, 100.2, 100.4)];

        // Close under VWAP 100.0
        prices.push((100.4, 100.5, 99.6, 99.7));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::LostVwap);

        // New low
        prices.push((99.7, 99.8, 99.2, 99.3));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::LegDown);

        // Bounce without a new low
        prices.push((99.3, 99.7, 99.25, 99.6));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::Bounce);

        // Close back above VWAP
        prices.push((99.6, 100.4, 99.5, 100.3));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::ReclaimedVwap);
        assert_eq!(book.leg_count(), 1);
    }

    #[test]
    fn test_vwap_machine_long_mirrors_short() {
        let mut book = book(StrategyKind::VwapContinuationFailed, Direction::Long);
        let mut log = CalloutLog::new();
        let mut prices = vec![(99.5, 99.8, 99.2, 99.6)];

        // Close above VWAP 100.0
        prices.push((99.6, 100.5, 99.5, 100.4));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::LostVwap);

        // New high
        prices.push((100.4, 100.9, 100.3, 100.8));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::LegDown);

        // Close back below VWAP
        prices.push((100.8, 100.85, 99.6, 99.7));
        book.update(&liquid(&prices, 100.0), None, &mut log);
        assert_eq!(book.state(), TradebookState::ReclaimedVwap);
        assert!(book.state().is_terminal());
    }

    #[test]
    fn test_breakout_trigger_and_duplicate_guard() {
        let mut book = book(StrategyKind::AboveWaterBreakout, Direction::Long);
        let mut log = CalloutLog::new();
        let prices = vec![(100.0, 100.8, 99.8, 100.5), (100.5, 101.6, 100.4, 101.5)];
        let market = liquid(&prices, 99.0);
        book.update(&market, None, &mut log);

        let Trigger::Enter(setup) = book.evaluate_trigger(&market, false) else {
            panic!("expected an entry");
        };
        assert_eq!(setup.entry_price, 101.5);
        // Worse of the breakout bar low and the band low
        assert_eq!(setup.stop_price, 100.0);

        let plan = TradingPlan::new("TEST", AtrInfo::new(4.0), KeyLevel::new(101.0, 100.0));
        let admission = AdmissionPipeline::new(&EngineSettings::default());
        let account = AccountSnapshot::default();
        let env = TradeEnv {
            market: &market,
            account: &account,
            plan: &plan,
            admission: &admission,
        };
        let mut gateway = RecordingGateway::new();

        let size = book.trigger_entry(setup, &env, &mut gateway);
        assert!(size > 0.0);
        assert_eq!(book.trigger_entry(setup, &env, &mut gateway), 0.0);
        assert_eq!(gateway.submitted.len(), 1);

        // Same candle and stop at a later live price is the same trigger
        let moved = EntrySetup {
            entry_price: 101.52,
            ..setup
        };
        assert_eq!(book.trigger_entry(moved, &env, &mut gateway), 0.0);
        assert_eq!(gateway.submitted.len(), 1);

        // The leg is spent
        assert_eq!(book.entered_leg(), Some(1));
        assert_eq!(book.evaluate_trigger(&market, false), Trigger::Hold);

        let instruction = &gateway.submitted[0];
        assert_eq!(instruction.tradebook_id, book.id);
        assert_eq!(instruction.target_prices.len(), 3);
        assert!(instruction.dry_run);
        assert_eq!(book.entry_pivot(), Some(100.0));
    }

    #[test]
    fn test_disabled_book_holds() {
        let mut book = Tradebook::new("TEST", Direction::Long, StrategyKind::OpenDrive, KeyLevel::single(100.0)).unwrap();
        assert!(!book.is_enabled());
        let market = liquid(&[(100.0, 100.5, 99.5, 100.2)], 99.0);
        assert_eq!(book.evaluate_trigger(&market, false), Trigger::Hold);

        book.set_enabled(true);
        book.stop();
        assert!(!book.is_enabled());
        assert!(book.live_stats().contains("stopped"));
    }

    #[test]
    fn test_clear_state_cancels_recheck() {
        let mut book = book(StrategyKind::Reversal, Direction::Long);
        let token = CancellationToken::new();
        book.set_pending_recheck(token.clone());
        assert!(book.has_pending_recheck());

        book.clear_state();
        assert!(token.is_cancelled());
        assert!(!book.has_pending_recheck());
        assert_eq!(book.state(), TradebookState::Observing);
    }

    #[test]
    fn test_clear_state_forgets_submissions() {
        let mut book = book(StrategyKind::AboveWaterBreakout, Direction::Long);
        let mut log = CalloutLog::new();
        let market = liquid(&[(100.0, 100.8, 99.8, 100.5), (100.5, 101.6, 100.4, 101.5)], 99.0);
        book.update(&market, None, &mut log);
        let Trigger::Enter(setup) = book.evaluate_trigger(&market, false) else {
            panic!("expected an entry");
        };

        let plan = TradingPlan::new("TEST", AtrInfo::new(4.0), KeyLevel::new(101.0, 100.0));
        let admission = AdmissionPipeline::new(&EngineSettings::default());
        let account = AccountSnapshot::default();
        let env = TradeEnv {
            market: &market,
            account: &account,
            plan: &plan,
            admission: &admission,
        };
        let mut gateway = RecordingGateway::new();
        assert!(book.trigger_entry(setup, &env, &mut gateway) > 0.0);

        book.clear_state();
        assert_eq!(book.entered_leg(), None);
        assert!(book.trigger_entry(setup, &env, &mut gateway) > 0.0);
        assert_eq!(gateway.submitted.len(), 2);
    }
}
