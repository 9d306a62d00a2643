// Order-side decisions: entry admission, exit adjudication, gateway and rechecks
pub mod admission;
pub mod exit_checks;
pub mod exits;
pub mod gateway;
pub mod scheduler;

pub use admission::{AdmissionDecision, AdmissionPipeline, EntryRequest};
pub use exit_checks::{trailing_reference_candle, ExitCheck, ExitContext};
pub use exits::{
    adjudicate_exit, check_limit_adjustment, check_market_out, check_stop_adjustment, ExitPredicate,
    LIMIT_CHECKS, MARKET_OUT_CHECKS, STOP_CHECKS,
};
pub use gateway::{OrderGateway, RecordingGateway};
pub use scheduler::{CancellationToken, RecheckInterval, ScheduledRecheck, Scheduler};
