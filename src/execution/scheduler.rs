/// Scheduled re-invocation of decision functions
///
/// Nothing here sleeps. A recheck is a due time plus the identity of the
/// tradebook to re-evaluate; the session pulls due rechecks on every tick and
/// runs a fresh decision from current market state.
use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};

use crate::config::EngineSettings;

/// Shared cancel flag between a tradebook and its pending recheck
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecheckInterval {
    Fixed(Duration),
    /// Base delay doubled on every attempt
    Backoff(Duration),
}

impl RecheckInterval {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let base = Duration::milliseconds(settings.recheck_delay_ms.max(0));
        if settings.recheck_backoff {
            RecheckInterval::Backoff(base)
        } else {
            RecheckInterval::Fixed(base)
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RecheckInterval::Fixed(delay) => *delay,
            RecheckInterval::Backoff(base) => *base * 2_i32.pow(attempt.min(10)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledRecheck {
    pub due: DateTime<Utc>,
    pub symbol: String,
    pub tradebook_id: String,
    /// Zero-based attempt number
    pub attempt: u32,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct Scheduler {
    queue: Vec<ScheduledRecheck>,
    interval: RecheckInterval,
    max_attempts: u32,
}

impl Scheduler {
    pub fn new(interval: RecheckInterval, max_attempts: u32) -> Self {
        Self {
            queue: Vec::new(),
            interval,
            max_attempts,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(RecheckInterval::from_settings(settings), settings.max_rechecks)
    }

    /// Queue a recheck; None once `attempt` has used up the retry budget
    pub fn schedule(
        &mut self,
        now: DateTime<Utc>,
        symbol: &str,
        tradebook_id: &str,
        attempt: u32,
    ) -> Option<CancellationToken> {
        if attempt >= self.max_attempts {
            tracing::debug!(
                "[{}] recheck budget exhausted for {} after {} attempts",
                symbol,
                tradebook_id,
                attempt
            );
            return None;
        }

        let token = CancellationToken::new();
        let recheck = ScheduledRecheck {
            due: now + self.interval.delay(attempt),
            symbol: symbol.to_string(),
            tradebook_id: tradebook_id.to_string(),
            attempt,
            token: token.clone(),
        };

        let at = self.queue.partition_point(|r| r.due <= recheck.due);
        self.queue.insert(at, recheck);
        Some(token)
    }

    /// Remove and return every uncancelled recheck due at `now`
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledRecheck> {
        let split = self.queue.partition_point(|r| r.due <= now);
        self.queue
            .drain(..split)
            .filter(|r| !r.token.is_cancelled())
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.iter().filter(|r| !r.token.is_cancelled()).count()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue
            .iter()
            .find(|r| !r.token.is_cancelled())
            .map(|r| r.due)
    }

    pub fn cancel_all(&mut self) {
        for recheck in self.queue.drain(..) {
            recheck.token.cancel();
        }
    }
}
