use super::events::{ClusterEvent, ClusterEventBus};
use super::node::{NodeId, NodeInfo};
use crate::error::ClusterError;
use crate::journal::log::JournalLog;
use crate::journal::types::JournaledCommand;

use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The materialized result of applying the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    nodes: BTreeMap<NodeId, NodeInfo>,
    leader: NodeId,
    self_id: NodeId,
    /// `None` until the first entry is applied, so serial 0 is a valid first entry.
    last_applied: Option<u64>,
}

impl ClusterState {
    fn new(self_node: NodeInfo) -> Self {
        let self_id = self_node.id();
        let mut nodes = BTreeMap::new();
        nodes.insert(self_id, self_node);
        Self {
            nodes,
            leader: self_id,
            self_id,
            last_applied: None,
        }
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, NodeInfo> {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    pub fn leader_id(&self) -> NodeId {
        self.leader
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn last_applied_serial(&self) -> Option<u64> {
        self.last_applied
    }

    pub(crate) fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn insert_node(&mut self, node: NodeInfo) {
        self.nodes.insert(node.id(), node);
    }
}

/// Single-writer state machine over the cluster metadata journal.
///
/// `apply` takes the write lock for the whole decode/apply/advance step; all
/// queries take the read lock and return owned snapshots.
pub struct ClusterStateMachine {
    state: RwLock<ClusterState>,
    journal: JournalLog,
    events: ClusterEventBus,
}

impl ClusterStateMachine {
    /// Bootstraps a state machine that knows only about this node, which is
    /// also the leader until told otherwise.
    pub fn new(self_node: NodeInfo) -> Self {
        tracing::info!(
            "Bootstrapping cluster state for node {} ({})",
            self_node.id(),
            self_node.name()
        );
        Self {
            state: RwLock::new(ClusterState::new(self_node)),
            journal: JournalLog::new(),
            events: ClusterEventBus::new(EVENT_CHANNEL_CAPACITY),
        }
    }

    /// Applies the next journal command.
    ///
    /// Fails without touching the state if the serial does not advance, if the
    /// command cannot be decoded, or if the entry is rejected (illegal state
    /// transition). Entries that target an unknown node succeed as no-ops.
    pub fn apply(&self, command: &JournaledCommand) -> Result<ClusterEvent, ClusterError> {
        let mut state = self.state.write();

        if let Some(last_applied) = state.last_applied
            && command.serial_number <= last_applied
        {
            tracing::warn!(
                "Rejecting journal serial {} (last applied {})",
                command.serial_number,
                last_applied
            );
            return Err(ClusterError::OutOfOrderSerial {
                serial: command.serial_number,
                last_applied,
            });
        }

        let entry = command.decode()?;
        let change = entry.apply(&mut state)?;

        state.last_applied = Some(command.serial_number);
        self.journal.append(command.clone());

        tracing::debug!(
            "Applied journal serial {} {:?} on node {}: {:?}",
            command.serial_number,
            entry.command(),
            entry.node_id(),
            change
        );

        // Published under the write lock so subscribers see events in serial order.
        let event = ClusterEvent {
            serial: command.serial_number,
            command: entry.command(),
            node_id: entry.node_id(),
            change,
        };
        self.events.publish(event.clone());
        drop(state);

        Ok(event)
    }

    /// Applies commands in order, stopping at the first failure.
    /// Returns how many were applied.
    pub fn replay<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a JournaledCommand>,
    ) -> Result<usize, ClusterError> {
        let mut applied = 0;
        for command in commands {
            self.apply(command)?;
            applied += 1;
        }
        tracing::info!("Replayed {} journal entries", applied);
        Ok(applied)
    }

    /// Inserts a node outside of the journal (bootstrap, tests). Replaces any
    /// existing record with the same id.
    pub fn add_node(&self, node: NodeInfo) {
        tracing::info!("Registering node {} ({})", node.id(), node.name());
        self.state.write().insert_node(node);
    }

    pub fn set_leader(&self, id: NodeId) -> Result<(), ClusterError> {
        let mut state = self.state.write();
        if !state.contains(&id) {
            return Err(ClusterError::UnknownNode(id));
        }
        if state.leader != id {
            tracing::info!("Leader changed {} -> {}", state.leader, id);
            state.leader = id;
        }
        Ok(())
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.state.read().nodes.values().cloned().collect()
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeInfo> {
        self.state.read().nodes.get(id).cloned()
    }

    /// Nodes currently owning `bucket`.
    pub fn nodes_for_bucket(&self, bucket: u32) -> Vec<NodeInfo> {
        self.state
            .read()
            .nodes
            .values()
            .filter(|node| node.owns_bucket(bucket))
            .cloned()
            .collect()
    }

    pub fn leader(&self) -> NodeInfo {
        let state = self.state.read();
        state.nodes[&state.leader].clone()
    }

    pub fn self_node(&self) -> NodeInfo {
        let state = self.state.read();
        state.nodes[&state.self_id].clone()
    }

    pub fn last_applied_serial(&self) -> Option<u64> {
        self.state.read().last_applied
    }

    pub fn snapshot(&self) -> ClusterState {
        self.state.read().clone()
    }

    /// Applied commands with a serial number at or after `start_serial`.
    pub fn journal_entries(&self, start_serial: u64) -> Vec<JournaledCommand> {
        self.journal.entries_from(start_serial)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.events.subscribe()
    }
}
