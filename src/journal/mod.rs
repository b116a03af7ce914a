//! Metadata Journal Module
//!
//! The journal is the append-only, strictly ordered log of cluster metadata changes.
//! It is the single source of truth: replaying it from the start on a fresh
//! `ClusterStateMachine` rebuilds the same node table on every replica.
//!
//! ## Submodules
//! - **`types`**: The wire record (`JournaledCommand`), its fixed command ordinals and typed payloads.
//! - **`entry`**: `JournalEntry`, the decoded form, and how each kind mutates the state.
//! - **`log`**: In-memory record of applied commands, served back to peers catching up.
//! - **`applier`**: Single-consumer loop that feeds ordered commands into the state machine.

pub mod applier;
pub mod entry;
pub mod log;
pub mod types;

pub use applier::JournalApplier;
pub use entry::JournalEntry;
pub use types::{JournalCommand, JournaledCommand};
