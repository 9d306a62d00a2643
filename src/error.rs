use thiserror::Error;

use crate::models::{Direction, StrategyKind};

/// Errors the engine can actually raise. Market conditions never end up here;
/// they are absorbed into a zero size or a disallowed exit with a reason.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} cannot trade {direction}: strategy is restricted to {allowed}")]
    WrongDirection {
        kind: StrategyKind,
        direction: Direction,
        allowed: Direction,
    },

    #[error("no trading plan for {0}")]
    PlanNotFound(String),

    #[error("failed to read plan file {path}: {source}")]
    PlanIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan: {0}")]
    PlanParse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Settings(#[from] config::ConfigError),
}
