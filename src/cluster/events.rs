use super::node::{NodeId, NodeState};
use crate::journal::types::JournalCommand;
use serde::Serialize;
use tokio::sync::broadcast;

/// What an applied journal entry did to its target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeChange {
    /// The entry referenced a node this replica does not know. Nothing changed.
    NodeMissing,
    /// The node already reflected the entry (a repeated, idempotent command).
    Unchanged,
    NodeAdded { name: String },
    BucketsAdded(Vec<u32>),
    BucketsRemoved(Vec<u32>),
    UrisReplaced(Vec<String>),
    StateChanged { from: NodeState, to: NodeState },
    BucketSynchronized(u32),
}

/// Published once per successfully applied journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterEvent {
    pub serial: u64,
    pub command: JournalCommand,
    pub node_id: NodeId,
    pub change: NodeChange,
}

/// Fan-out of cluster events to external subscribers (gossip, replication, overseers).
pub struct ClusterEventBus {
    tx: broadcast::Sender<ClusterEvent>,
}

impl ClusterEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// No-op if there are no subscribers.
    pub fn publish(&self, event: ClusterEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
