/// Receiver of spoken/advisory callouts. Best-effort: the engine never
/// branches on delivery.
pub trait AdvisorySink {
    fn callout(&mut self, symbol: &str, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callout {
    pub symbol: String,
    pub message: String,
}

/// Keeps every callout in memory
#[derive(Debug, Clone, Default)]
pub struct CalloutLog {
    pub callouts: Vec<Callout>,
}

impl CalloutLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, symbol: &str) -> usize {
        self.callouts.iter().filter(|c| c.symbol == symbol).count()
    }
}

impl AdvisorySink for CalloutLog {
    fn callout(&mut self, symbol: &str, message: &str) {
        self.callouts.push(Callout {
            symbol: symbol.to_string(),
            message: message.to_string(),
        });
    }
}

/// Writes callouts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAdvisor;

impl AdvisorySink for TracingAdvisor {
    fn callout(&mut self, symbol: &str, message: &str) {
        tracing::info!("[{}] 🔔 {}", symbol, message);
    }
}
