// Core modules
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod market;
pub mod models;
pub mod regime;
pub mod replay;
pub mod risk;
pub mod session;
pub mod signals;
pub mod strategy;

// Re-export commonly used types
pub use config::EngineSettings;
pub use error::EngineError;
pub use models::*;
pub use session::Session;
pub use strategy::Tradebook;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
