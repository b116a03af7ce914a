//! Sharded Key-Value Store Control Plane
//!
//! This library crate holds the pieces every storage node shares.
//! It serves as the foundation for the node binary (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`keys`**: Key validation and the SHA-256 based hash code that decides where a key lives.
//! - **`storage`**: Bucket routing (`hash_code % bucket_count`) and the bucket backends: local
//!   directories, and other nodes reached through the HTTP bucket facade.
//! - **`journal`**: The replicated command log. Raw `{SerialNumber, Type, Data}` records are
//!   decoded into typed entries and fed, in order, to the state machine.
//! - **`cluster`**: Node records and the state machine that owns the cluster view. Every
//!   applied journal entry is published as a `ClusterEvent`.
//! - **`config`**: Node settings read from command line flags.
//! - **`error`**: Typed errors of each subsystem.

pub mod cluster;
pub mod config;
pub mod error;
pub mod journal;
pub mod keys;
pub mod storage;
