//! Journal Apply Loop
//!
//! Serializes all writes to the state machine through one consumer. Producers
//! (replication, admin tooling) push ordered commands into the channel; the
//! loop applies them one at a time and stops on the first failure, since
//! skipping a command would silently diverge this replica from the others.

use super::types::JournaledCommand;
use crate::cluster::state::ClusterStateMachine;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default capacity of the command channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub struct JournalApplier {
    machine: Arc<ClusterStateMachine>,
    commands: mpsc::Receiver<JournaledCommand>,
}

impl JournalApplier {
    /// Creates the applier and the sender half producers write to.
    pub fn channel(
        machine: Arc<ClusterStateMachine>,
        capacity: usize,
    ) -> (mpsc::Sender<JournaledCommand>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                machine,
                commands: rx,
            },
        )
    }

    /// Applies commands until every sender is dropped.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of applied commands once the channel closes.
    /// * `Err` on the first command the state machine rejects. The loop halts
    ///   there; the caller must reconcile before resuming.
    pub async fn run(mut self) -> Result<u64> {
        tracing::info!("Journal applier started");
        let mut applied = 0u64;

        while let Some(command) = self.commands.recv().await {
            let serial = command.serial_number;
            self.machine
                .apply(&command)
                .with_context(|| format!("failed to apply journal serial {}", serial))
                .inspect_err(|e| tracing::error!("Journal applier halted: {:#}", e))?;
            applied += 1;
            tracing::trace!("Applied journal serial {}", serial);
        }

        tracing::info!("Journal applier stopped after {} entries", applied);
        Ok(applied)
    }

    /// Runs the loop on the tokio runtime.
    pub fn start(self) -> tokio::task::JoinHandle<Result<u64>> {
        tokio::spawn(self.run())
    }
}
