use super::types::{
    BucketSynchronized, JournalCommand, JournaledCommand, NewNode, NodeBuckets, NodeContact,
    NodeRef, NodeStateChange,
};
use crate::cluster::events::NodeChange;
use crate::cluster::node::{NodeId, NodeInfo, NodeState};
use crate::cluster::state::ClusterState;
use crate::error::{ClusterError, JournalError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A decoded journal command. One variant per [`JournalCommand`], each owning
/// its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    AddBucketsToNode(NodeBuckets),
    AddNode(NewNode),
    BlockNode(NodeRef),
    NodeContactUpdate(NodeContact),
    NodeNotifyBucketSynchronized(BucketSynchronized),
    RemoveBucketsFromNode(NodeBuckets),
    NodeStateUpdate(NodeStateChange),
    NodeClearBuckets(NodeRef),
}

impl JournalEntry {
    pub fn decode(command: JournalCommand, data: &serde_json::Value) -> Result<Self, JournalError> {
        Ok(match command {
            JournalCommand::AddBucketsToNode => Self::AddBucketsToNode(payload(command, data)?),
            JournalCommand::AddNode => Self::AddNode(payload(command, data)?),
            JournalCommand::BlockNode => Self::BlockNode(payload(command, data)?),
            JournalCommand::NodeContactUpdate => Self::NodeContactUpdate(payload(command, data)?),
            JournalCommand::NodeNotifyBucketSynchronized => {
                Self::NodeNotifyBucketSynchronized(payload(command, data)?)
            }
            JournalCommand::RemoveBucketsFromNode => {
                Self::RemoveBucketsFromNode(payload(command, data)?)
            }
            JournalCommand::NodeStateUpdate => Self::NodeStateUpdate(payload(command, data)?),
            JournalCommand::NodeClearBuckets => Self::NodeClearBuckets(payload(command, data)?),
        })
    }

    pub fn command(&self) -> JournalCommand {
        match self {
            Self::AddBucketsToNode(_) => JournalCommand::AddBucketsToNode,
            Self::AddNode(_) => JournalCommand::AddNode,
            Self::BlockNode(_) => JournalCommand::BlockNode,
            Self::NodeContactUpdate(_) => JournalCommand::NodeContactUpdate,
            Self::NodeNotifyBucketSynchronized(_) => JournalCommand::NodeNotifyBucketSynchronized,
            Self::RemoveBucketsFromNode(_) => JournalCommand::RemoveBucketsFromNode,
            Self::NodeStateUpdate(_) => JournalCommand::NodeStateUpdate,
            Self::NodeClearBuckets(_) => JournalCommand::NodeClearBuckets,
        }
    }

    /// The node this entry targets.
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::AddBucketsToNode(data) | Self::RemoveBucketsFromNode(data) => data.node_id,
            Self::AddNode(data) => data.node_id,
            Self::BlockNode(data) | Self::NodeClearBuckets(data) => data.node_id,
            Self::NodeContactUpdate(data) => data.node_id,
            Self::NodeNotifyBucketSynchronized(data) => data.node_id,
            Self::NodeStateUpdate(data) => data.node_id,
        }
    }

    /// Encodes the entry back into a wire record with the given serial.
    pub fn into_command(self, serial_number: u64) -> Result<JournaledCommand, serde_json::Error> {
        let command = self.command();
        let data = match &self {
            Self::AddBucketsToNode(data) | Self::RemoveBucketsFromNode(data) => to_data(data)?,
            Self::AddNode(data) => to_data(data)?,
            Self::BlockNode(data) | Self::NodeClearBuckets(data) => to_data(data)?,
            Self::NodeContactUpdate(data) => to_data(data)?,
            Self::NodeNotifyBucketSynchronized(data) => to_data(data)?,
            Self::NodeStateUpdate(data) => to_data(data)?,
        };
        Ok(JournaledCommand::new(serial_number, command, data))
    }

    /// Applies the entry to the cluster state.
    ///
    /// Entries naming a node this replica does not have are no-ops. On error
    /// the state is left untouched.
    pub fn apply(&self, state: &mut ClusterState) -> Result<NodeChange, ClusterError> {
        if let Self::AddNode(data) = self {
            return add_node(state, data);
        }

        let node_id = self.node_id();
        let Some(node) = state.node_mut(&node_id) else {
            tracing::warn!(
                "Journal {:?} references unknown node {}, skipping",
                self.command(),
                node_id
            );
            return Ok(NodeChange::NodeMissing);
        };

        self.apply_to_node(node)
    }

    fn apply_to_node(&self, node: &mut NodeInfo) -> Result<NodeChange, ClusterError> {
        let change = match self {
            Self::AddBucketsToNode(data) => {
                let added = node.add_buckets(data.buckets.iter().copied());
                changed_or(!added.is_empty(), NodeChange::BucketsAdded(added))
            }
            Self::RemoveBucketsFromNode(data) => {
                let removed = node.remove_buckets(data.buckets.iter().copied());
                changed_or(!removed.is_empty(), NodeChange::BucketsRemoved(removed))
            }
            Self::NodeClearBuckets(_) => {
                let removed = node.clear_buckets();
                changed_or(!removed.is_empty(), NodeChange::BucketsRemoved(removed))
            }
            Self::BlockNode(_) => transition(node, NodeState::Blocked)?,
            Self::NodeStateUpdate(data) => transition(node, data.state)?,
            Self::NodeContactUpdate(data) => {
                let changed = node.set_uris(data.uris.iter().cloned());
                changed_or(
                    changed,
                    NodeChange::UrisReplaced(data.uris.iter().map(|uri| uri.to_string()).collect()),
                )
            }
            Self::NodeNotifyBucketSynchronized(data) => changed_or(
                node.mark_synchronized(data.bucket),
                NodeChange::BucketSynchronized(data.bucket),
            ),
            Self::AddNode(_) => NodeChange::Unchanged,
        };
        Ok(change)
    }
}

fn add_node(state: &mut ClusterState, data: &NewNode) -> Result<NodeChange, ClusterError> {
    if state.contains(&data.node_id) {
        tracing::debug!("Node {} already present, AddNode is a no-op", data.node_id);
        return Ok(NodeChange::Unchanged);
    }

    let mut node = NodeInfo::new(data.node_id, data.name.clone(), data.uris.iter().cloned());
    node.set_state(NodeState::Pending)?;
    state.insert_node(node);

    tracing::info!("Node {} ({}) added to cluster", data.node_id, data.name);
    Ok(NodeChange::NodeAdded {
        name: data.name.clone(),
    })
}

fn transition(node: &mut NodeInfo, next: NodeState) -> Result<NodeChange, ClusterError> {
    let from = node.state();
    if node.set_state(next)? {
        tracing::info!("Node {} state {:?} -> {:?}", node.id(), from, next);
        Ok(NodeChange::StateChanged { from, to: next })
    } else {
        Ok(NodeChange::Unchanged)
    }
}

fn changed_or(changed: bool, change: NodeChange) -> NodeChange {
    if changed { change } else { NodeChange::Unchanged }
}

fn payload<T: DeserializeOwned>(
    command: JournalCommand,
    data: &serde_json::Value,
) -> Result<T, JournalError> {
    T::deserialize(data).map_err(|source| JournalError::MalformedPayload { command, source })
}

fn to_data<T: Serialize>(data: &T) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(data)
}
