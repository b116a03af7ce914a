use crate::cluster::node::{NodeId, NodeState, uri_set};
use crate::error::JournalError;
use crate::journal::entry::JournalEntry;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kinds of journal commands.
///
/// The discriminants are written to the journal and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum JournalCommand {
    /// Add the listed buckets to a node.
    AddBucketsToNode = 0,
    /// An administrator approved a pending node; carries its id, name and base URIs.
    AddNode = 1,
    /// An administrator blocked a pending node.
    BlockNode = 2,
    /// A node came online with a new set of URIs, replacing the old set.
    NodeContactUpdate = 3,
    /// A node finished replicating a recently added bucket. The overseer may now
    /// remove that bucket from another node once replication goals are met.
    NodeNotifyBucketSynchronized = 4,
    /// Remove buckets from a node. Data is not deleted, the node reclaims the
    /// space later.
    RemoveBucketsFromNode = 5,
    /// New information about a node's health.
    NodeStateUpdate = 6,
    /// Remove all buckets from a node.
    NodeClearBuckets = 7,
}

impl JournalCommand {
    pub const ALL: [JournalCommand; 8] = [
        JournalCommand::AddBucketsToNode,
        JournalCommand::AddNode,
        JournalCommand::BlockNode,
        JournalCommand::NodeContactUpdate,
        JournalCommand::NodeNotifyBucketSynchronized,
        JournalCommand::RemoveBucketsFromNode,
        JournalCommand::NodeStateUpdate,
        JournalCommand::NodeClearBuckets,
    ];

    pub fn ordinal(self) -> u32 {
        self as u32
    }
}

impl From<JournalCommand> for u32 {
    fn from(command: JournalCommand) -> Self {
        command.ordinal()
    }
}

impl TryFrom<u32> for JournalCommand {
    type Error = JournalError;

    fn try_from(ordinal: u32) -> Result<Self, Self::Error> {
        JournalCommand::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(JournalError::UnsupportedCommand(ordinal))
    }
}

/// A journal record as it travels between nodes: `{SerialNumber, Type, Data}`.
///
/// `Type` is kept as the raw ordinal so a record written by a newer producer
/// still parses, and fails loudly at [`decode`](Self::decode) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournaledCommand {
    #[serde(alias = "serialNumber")]
    pub serial_number: u64,
    #[serde(rename = "Type", alias = "type")]
    pub kind: u32,
    #[serde(alias = "data", default)]
    pub data: serde_json::Value,
}

impl JournaledCommand {
    pub fn new(serial_number: u64, command: JournalCommand, data: serde_json::Value) -> Self {
        Self {
            serial_number,
            kind: command.ordinal(),
            data,
        }
    }

    pub fn command(&self) -> Result<JournalCommand, JournalError> {
        JournalCommand::try_from(self.kind)
    }

    /// Turns the record into a typed entry.
    pub fn decode(&self) -> Result<JournalEntry, JournalError> {
        JournalEntry::decode(self.command()?, &self.data)
    }
}

// --- Payloads ---
//
// Field names are PascalCase on the wire; camelCase is accepted as well.

/// Payload of commands that only name a node (`BlockNode`, `NodeClearBuckets`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeRef {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
}

/// Payload of `AddBucketsToNode` and `RemoveBucketsFromNode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeBuckets {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
    #[serde(alias = "buckets", default)]
    pub buckets: BTreeSet<u32>,
}

/// Payload of `AddNode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewNode {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
    #[serde(alias = "name", default)]
    pub name: String,
    #[serde(alias = "uris", default, with = "uri_set")]
    pub uris: BTreeSet<Url>,
}

/// Payload of `NodeContactUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeContact {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
    #[serde(alias = "uris", default, with = "uri_set")]
    pub uris: BTreeSet<Url>,
}

/// Payload of `NodeStateUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeStateChange {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
    #[serde(alias = "state")]
    pub state: NodeState,
}

/// Payload of `NodeNotifyBucketSynchronized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketSynchronized {
    #[serde(alias = "nodeId")]
    pub node_id: NodeId,
    #[serde(alias = "bucket")]
    pub bucket: u32,
}
