use crate::models::{Direction, EntryInstruction};

/// Broker-side order submission. Fire-and-forget: the engine never waits on
/// a confirmation.
pub trait OrderGateway {
    fn submit_entry(&mut self, instruction: EntryInstruction);

    fn cancel_entry_orders(&mut self, symbol: &str, direction: Direction);
}

/// Gateway that keeps every instruction in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    pub submitted: Vec<EntryInstruction>,
    pub cancelled: Vec<(String, Direction)>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted_for(&self, symbol: &str) -> impl Iterator<Item = &EntryInstruction> {
        let symbol = symbol.to_string();
        self.submitted.iter().filter(move |i| i.symbol == symbol)
    }
}

impl OrderGateway for RecordingGateway {
    fn submit_entry(&mut self, instruction: EntryInstruction) {
        tracing::info!(
            "[{} {}] {} entry {} {:?} size {:.2} @ {:.2} stop {:.2}",
            instruction.symbol,
            instruction.direction,
            if instruction.dry_run { "dry-run" } else { "live" },
            instruction.id,
            instruction.order_type,
            instruction.size,
            instruction.price,
            instruction.stop_price
        );
        self.submitted.push(instruction);
    }

    fn cancel_entry_orders(&mut self, symbol: &str, direction: Direction) {
        tracing::info!("[{} {}] cancel entry orders", symbol, direction);
        self.cancelled.push((symbol.to_string(), direction));
    }
}
