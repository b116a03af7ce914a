//! Key Hashing Module
//!
//! Turns user supplied key strings into stable, durable addresses.
//!
//! ## Core Concepts
//! - **Validation**: Keys are restricted to `[a-z0-9-_]+` before anything else touches them.
//! - **Hashing**: A 32-bit hash code is folded out of two SHA-256 digests (the key and its
//!   reverse). The fold reads digest words in a fixed byte order, so every host computes the
//!   same code and buckets written by one node can be found by any other.

pub mod hasher;
pub mod types;
pub mod validator;

pub use hasher::{KeyHasher, Sha256KeyHasher};
pub use types::Key;
pub use validator::{KeyValidator, PatternKeyValidator};
