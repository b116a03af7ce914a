//! Error Types
//!
//! One `thiserror` enum per subsystem. Library code returns these typed errors;
//! `anyhow` is only used at the binary edge (`main.rs`, the apply loop wiring).

use crate::cluster::node::{NodeId, NodeState};
use crate::journal::types::JournalCommand;
use thiserror::Error;

/// Failures of the key validation gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error(
        "invalid key {key:?}: keys can only consist of lower case alphanumeric characters, dash (-), or underscore (_)"
    )]
    Invalid { key: String },
}

/// Conditions returned by bucket backends. None of these are retried.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("key {0:?} already exists")]
    AlreadyExists(String),

    #[error("key {0:?} not found")]
    NotFound(String),

    #[error("bucket count must be greater than zero")]
    InvalidBucketCount,

    #[error("bucket {bucket} is outside of [0, {count})")]
    BucketOutOfRange { bucket: u32, count: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote bucket error: {0}")]
    Remote(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Remote(e.to_string())
    }
}

/// Failures turning a raw journal record into a typed entry.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("unsupported journal command type {0}")]
    UnsupportedCommand(u32),

    #[error("malformed payload for {command:?}: {source}")]
    MalformedPayload {
        command: JournalCommand,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures raised by the cluster state machine.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("journal serial {serial} is not after last applied serial {last_applied}")]
    OutOfOrderSerial { serial: u64, last_applied: u64 },

    #[error("illegal state transition for node {node}: {from:?} -> {to:?}")]
    IllegalTransition {
        node: NodeId,
        from: NodeState,
        to: NodeState,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error(transparent)]
    Journal(#[from] JournalError),
}
