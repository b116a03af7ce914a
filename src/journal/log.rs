use super::types::JournaledCommand;
use parking_lot::RwLock;

/// Append-only record of the commands this replica has applied, in serial order.
#[derive(Default)]
pub struct JournalLog {
    entries: RwLock<Vec<JournaledCommand>>,
}

impl JournalLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callers must append in increasing serial order; the state machine does.
    pub fn append(&self, command: JournaledCommand) {
        self.entries.write().push(command);
    }

    pub fn entries_from(&self, start_serial: u64) -> Vec<JournaledCommand> {
        let entries = self.entries.read();
        let start = entries.partition_point(|entry| entry.serial_number < start_serial);
        entries[start..].to_vec()
    }

    pub fn last_serial(&self) -> Option<u64> {
        self.entries.read().last().map(|entry| entry.serial_number)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
