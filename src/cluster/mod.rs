//! Cluster State Module
//!
//! Holds the replicated view of which storage node owns which buckets.
//!
//! ## Core Concepts
//! - **Nodes**: `NodeInfo` records keyed by `NodeId`, each with a bucket set and a lifecycle state.
//! - **Lifecycle**: `NodeState` transitions are checked against an explicit table; illegal moves are
//!   rejected and leave the node untouched.
//! - **State Machine**: `ClusterStateMachine` applies journal commands in strictly increasing serial
//!   order. Every apply happens under one write lock, so readers observe either the state before or
//!   after a command, never a half applied one.
//! - **Events**: each successful apply publishes one `ClusterEvent` on a broadcast channel for
//!   replication or gossip layers that want to react to changes.

pub mod events;
pub mod handlers;
pub mod node;
pub mod state;

pub use events::{ClusterEvent, ClusterEventBus, NodeChange};
pub use node::{NodeId, NodeInfo, NodeState};
pub use state::{ClusterState, ClusterStateMachine};

#[cfg(test)]
mod tests;
