use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::models::AccountSnapshot;

/// Session-wide breakers that halt every new entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakers {
    /// Realized loss in dollars that halts trading
    pub daily_max_loss: f64,
    pub max_daily_entries: Option<u32>,
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self {
            daily_max_loss: 500.0, // $500 realized loss
            max_daily_entries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerTrip {
    DailyLoss { realized_pnl: f64, limit: f64 },
    DailyEntryLimit { entries: u32, limit: u32 },
}

impl std::fmt::Display for CircuitBreakerTrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerTrip::DailyLoss { realized_pnl, limit } => {
                write!(f, "daily max loss hit: realized {:.2}, limit {:.2}", realized_pnl, limit)
            }
            CircuitBreakerTrip::DailyEntryLimit { entries, limit } => {
                write!(f, "daily entry limit hit: {} of {}", entries, limit)
            }
        }
    }
}

impl CircuitBreakers {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            daily_max_loss: settings.daily_max_loss,
            max_daily_entries: settings.max_daily_entries,
        }
    }

    pub fn check(&self, account: &AccountSnapshot) -> Result<(), CircuitBreakerTrip> {
        // Check daily loss
        if account.realized_pnl < 0.0 && -account.realized_pnl >= self.daily_max_loss {
            return Err(CircuitBreakerTrip::DailyLoss {
                realized_pnl: account.realized_pnl,
                limit: self.daily_max_loss,
            });
        }

        // Check daily entry limit
        if let Some(limit) = self.max_daily_entries {
            if account.entries_today >= limit {
                return Err(CircuitBreakerTrip::DailyEntryLimit {
                    entries: account.entries_today,
                    limit,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_daily_loss() {
        let breakers = CircuitBreakers::default();
        let account = AccountSnapshot {
            realized_pnl: -500.0,
            ..Default::default()
        };

        let result = breakers.check(&account);
        assert!(matches!(result, Err(CircuitBreakerTrip::DailyLoss { .. })));
        assert!(result.unwrap_err().to_string().starts_with("daily max loss hit"));
    }

    #[test]
    fn test_circuit_breaker_profit_never_trips() {
        let breakers = CircuitBreakers {
            daily_max_loss: 0.0,
            max_daily_entries: None,
        };
        let account = AccountSnapshot {
            realized_pnl: 1_000.0,
            ..Default::default()
        };
        assert!(breakers.check(&account).is_ok());
    }

    #[test]
    fn test_circuit_breaker_entry_limit() {
        let breakers = CircuitBreakers {
            daily_max_loss: 500.0,
            max_daily_entries: Some(3),
        };
        let account = AccountSnapshot {
            entries_today: 3,
            ..Default::default()
        };

        let result = breakers.check(&account);
        assert_eq!(
            result,
            Err(CircuitBreakerTrip::DailyEntryLimit { entries: 3, limit: 3 })
        );
    }

    #[test]
    fn test_circuit_breaker_ok() {
        let breakers = CircuitBreakers::from_settings(&EngineSettings::default());
        let account = AccountSnapshot {
            realized_pnl: -499.0,
            entries_today: 40,
            ..Default::default()
        };

        let result = breakers.check(&account);
        assert!(result.is_ok());
    }
}
