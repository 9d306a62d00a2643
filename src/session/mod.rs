// Session lifecycle: owns all per-symbol state and routes events to it
pub mod registry;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::execution::{
    adjudicate_exit, AdmissionPipeline, EntryRequest, ExitContext, OrderGateway, Scheduler,
};
use crate::market::{MarketDataProvider, MarketSnapshot};
use crate::models::{
    AccountSnapshot, CheckRulesResult, Direction, EntryInstruction, ExitAction, KeyLevel, OrderType, TradingPlan,
};
use crate::regime::{detect_ordering, SessionOrdering, StrategySelector};
use crate::signals::target_prices;
use crate::strategy::{AdvisorySink, StateTransition, SubmissionKey, TradeEnv, Trigger};

pub use registry::TradebookRegistry;

/// Operator entry request, admitted with the entry-distance check on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualEntry {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub order_type: OrderType,
}

/// One trading session
///
/// Single writer: every entry point takes `&mut self` and runs to completion.
/// Repeating an event with the same market state never submits twice.
pub struct Session<G: OrderGateway, A: AdvisorySink> {
    settings: EngineSettings,
    admission: AdmissionPipeline,
    plans: HashMap<String, TradingPlan>,
    registry: TradebookRegistry,
    orderings: HashMap<String, Option<SessionOrdering>>,
    manual_submissions: HashSet<(String, Direction, SubmissionKey, u64)>,
    scheduler: Scheduler,
    gateway: G,
    advisor: A,
}

impl<G: OrderGateway, A: AdvisorySink> Session<G, A> {
    pub fn new(settings: EngineSettings, plans: Vec<TradingPlan>, gateway: G, advisor: A) -> Result<Self, EngineError> {
        let registry = TradebookRegistry::from_plans(&plans)?;
        tracing::info!(
            "Session started: {} symbol(s), {} tradebook(s), dry_run={}",
            plans.len(),
            registry.len(),
            settings.dry_run
        );

        Ok(Self {
            admission: AdmissionPipeline::new(&settings),
            scheduler: Scheduler::from_settings(&settings),
            plans: plans.into_iter().map(|p| (p.symbol.clone(), p)).collect(),
            registry,
            orderings: HashMap::new(),
            manual_submissions: HashSet::new(),
            settings,
            gateway,
            advisor,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn advisor(&self) -> &A {
        &self.advisor
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &TradebookRegistry {
        &self.registry
    }

    pub fn plan(&self, symbol: &str) -> Option<&TradingPlan> {
        self.plans.get(symbol)
    }

    /// Last applied ordering; None before the first selection or while
    /// VWAP/open are unknown
    pub fn ordering(&self, symbol: &str) -> Option<SessionOrdering> {
        self.orderings.get(symbol).copied().flatten()
    }

    /// Re-run strategy selection when the ordering changed
    fn reselect(&mut self, market: &MarketSnapshot, key_level: &KeyLevel) {
        // Pre-open VWAP when there was premarket trading, else the session VWAP
        let vwap = market.vwap_before_open.or_else(|| market.latest_vwap());
        let ordering = match (market.open_price(), vwap) {
            (Some(open), Some(vwap)) => Some(detect_ordering(open, vwap, key_level)),
            _ => None,
        };

        if self.orderings.get(&market.symbol) == Some(&ordering) {
            return;
        }
        if let Some(o) = ordering {
            tracing::info!("[{}] session ordering: {}", market.symbol, o);
        }
        StrategySelector::apply(ordering, self.registry.for_symbol_mut(&market.symbol));
        self.orderings.insert(market.symbol.clone(), ordering);
    }

    /// Closed-candle event: selection, state machines, then triggers.
    /// Returns the state changes it caused.
    pub fn on_candle_closed(&mut self, symbol: &str, provider: &dyn MarketDataProvider) -> Vec<StateTransition> {
        let Some(market) = provider.snapshot(symbol) else {
            tracing::warn!("[{}] no market snapshot, candle ignored", symbol);
            return Vec::new();
        };
        let Some(key_level) = self.plans.get(symbol).map(|p| p.key_level) else {
            tracing::warn!("[{}] {}", symbol, EngineError::PlanNotFound(symbol.to_string()));
            return Vec::new();
        };
        let account = provider.account();

        self.reselect(&market, &key_level);

        let Self {
            admission,
            plans,
            registry,
            scheduler,
            gateway,
            advisor,
            ..
        } = self;
        let Some(plan) = plans.get(symbol) else {
            return Vec::new();
        };
        let env = TradeEnv {
            market: &market,
            account: &account,
            plan,
            admission,
        };

        let mut transitions = Vec::new();
        for book in registry.for_symbol_mut(symbol) {
            if let Some(t) = book.update(&market, account.position(symbol), &mut *advisor) {
                transitions.push(t);
            }

            match book.evaluate_trigger(&market, false) {
                Trigger::Hold => {}
                Trigger::Enter(setup) => {
                    book.trigger_entry(setup, &env, &mut *gateway);
                }
                Trigger::Recheck => {
                    if !book.has_pending_recheck() {
                        if let Some(token) = scheduler.schedule(market.now, symbol, &book.id, 0) {
                            tracing::debug!("[{}] recheck scheduled", book.id);
                            book.set_pending_recheck(token);
                        }
                    }
                }
            }
        }
        transitions
    }

    /// Clock event: runs every recheck due at `now`. Returns the total size
    /// admitted by the rechecks.
    pub fn on_tick(&mut self, now: DateTime<Utc>, provider: &dyn MarketDataProvider) -> f64 {
        let account = provider.account();
        let mut admitted = 0.0;

        for recheck in self.scheduler.take_due(now) {
            let Some(market) = provider.snapshot(&recheck.symbol) else {
                continue;
            };
            let Some(plan) = self.plans.get(&recheck.symbol) else {
                continue;
            };
            let Some(book) = self.registry.get_mut(&recheck.tradebook_id) else {
                continue;
            };

            let env = TradeEnv {
                market: &market,
                account: &account,
                plan,
                admission: &self.admission,
            };

            match book.evaluate_trigger(&market, true) {
                Trigger::Enter(setup) => {
                    book.cancel_recheck();
                    admitted += book.trigger_entry(setup, &env, &mut self.gateway);
                }
                Trigger::Recheck => {
                    match self
                        .scheduler
                        .schedule(now, &recheck.symbol, &recheck.tradebook_id, recheck.attempt + 1)
                    {
                        Some(token) => book.set_pending_recheck(token),
                        None => book.cancel_recheck(),
                    }
                }
                Trigger::Hold => book.cancel_recheck(),
            }
        }
        admitted
    }

    /// Operator entry. Idempotent for the same candle, prices and direction.
    pub fn request_entry(&mut self, symbol: &str, entry: ManualEntry, provider: &dyn MarketDataProvider) -> f64 {
        let Some(market) = provider.snapshot(symbol) else {
            tracing::warn!("[{}] manual entry ignored: no market snapshot", symbol);
            return 0.0;
        };
        let Some(plan) = self.plans.get(symbol) else {
            tracing::warn!("[{}] manual entry ignored: {}", symbol, EngineError::PlanNotFound(symbol.to_string()));
            return 0.0;
        };

        // Operator prices are part of the request, so they key it too
        let key = (
            symbol.to_string(),
            entry.direction,
            SubmissionKey::new(market.candles.len(), entry.stop_price),
            entry.entry_price.to_bits(),
        );
        if self.manual_submissions.contains(&key) {
            tracing::debug!("[{} {}] duplicate manual entry ignored", symbol, entry.direction);
            return 0.0;
        }

        let request = EntryRequest {
            symbol: symbol.to_string(),
            direction: entry.direction,
            entry_price: entry.entry_price,
            stop_price: entry.stop_price,
            order_type: entry.order_type,
            check_entry_distance: true,
            source: "manual".to_string(),
        };
        let side = plan.side(entry.direction);
        let decision = self
            .admission
            .evaluate(&request, &side.base, side, &market, &provider.account());
        if !decision.is_allowed() {
            return 0.0;
        }

        self.gateway.submit_entry(EntryInstruction {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction: entry.direction,
            order_type: entry.order_type,
            price: entry.entry_price,
            stop_price: entry.stop_price,
            risk_level_price: entry.stop_price,
            size: decision.size,
            target_prices: target_prices(
                entry.direction,
                entry.entry_price,
                entry.stop_price,
                &market.atr,
                &side.base.targets,
                side.base.batch_count,
            ),
            plan: side.base.clone(),
            tradebook_id: format!("{}-{}-manual", symbol, entry.direction),
            dry_run: self.settings.dry_run,
        });
        self.manual_submissions.insert(key);
        decision.size
    }

    /// Adjudicate an exit action on the symbol's open position
    pub fn check_exit(&self, symbol: &str, action: ExitAction, provider: &dyn MarketDataProvider) -> CheckRulesResult {
        let Some(market) = provider.snapshot(symbol) else {
            return CheckRulesResult::disallow("no market snapshot");
        };
        let Some(plan) = self.plans.get(symbol) else {
            return CheckRulesResult::disallow(EngineError::PlanNotFound(symbol.to_string()).to_string());
        };
        let account: AccountSnapshot = provider.account();
        let Some(position) = account.position(symbol) else {
            return CheckRulesResult::disallow("no open position");
        };

        let owner = position
            .tradebook_id
            .as_deref()
            .and_then(|id| self.registry.get(id));
        let Some(direction) = position.direction() else {
            return CheckRulesResult::disallow("no open position");
        };
        let base = match owner {
            Some(book) => plan.plan_for(direction, book.kind),
            None => &plan.side(direction).base,
        };
        let manual = owner.is_some_and(|b| b.manual_control());

        let Some(ctx) = ExitContext::new(action, position, base, &market, &self.settings, manual) else {
            return CheckRulesResult::disallow("no open position");
        };

        let predicate = |ctx: &ExitContext| match owner {
            Some(book) => book.exit_predicate(ctx),
            None => CheckRulesResult::disallow("no strategy owns this position"),
        };
        let result = adjudicate_exit(&ctx, &predicate);
        tracing::info!("[{}] {} -> {}", ctx.tag(), action, result);
        result
    }

    /// Operator stop: the tradebook goes quiet for the rest of the session
    /// and its pending entry orders are cancelled
    pub fn stop_tradebook(&mut self, id: &str) -> bool {
        let Some(book) = self.registry.get_mut(id) else {
            return false;
        };
        book.stop();
        self.gateway.cancel_entry_orders(&book.symbol, book.direction);
        tracing::info!("[{}] stopped", id);
        true
    }

    pub fn set_manual_control(&mut self, id: &str, manual: bool) -> bool {
        let Some(book) = self.registry.get_mut(id) else {
            return false;
        };
        book.set_manual_control(manual);
        tracing::info!("[{}] manual control {}", id, if manual { "on" } else { "off" });
        true
    }

    /// End of day: drop every tradebook and recheck, start over with `plans`
    pub fn rollover(&mut self, plans: Vec<TradingPlan>) -> Result<(), EngineError> {
        self.scheduler.cancel_all();
        self.registry.clear();
        self.registry = TradebookRegistry::from_plans(&plans)?;
        self.plans = plans.into_iter().map(|p| (p.symbol.clone(), p)).collect();
        self.orderings.clear();
        self.manual_submissions.clear();
        tracing::info!("Session rolled over: {} tradebook(s)", self.registry.len());
        Ok(())
    }
}
