use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated key together with its durable hash code.
///
/// Keys are immutable value objects. Hashing the same string twice yields two
/// equal, independently owned `Key`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Key {
    #[serde(alias = "value")]
    value: String,
    #[serde(alias = "hashCode")]
    hash_code: u32,
}

impl Key {
    /// Builds a key from already computed parts. Callers outside this crate
    /// should go through a [`KeyHasher`](super::KeyHasher) instead.
    pub fn new(value: impl Into<String>, hash_code: u32) -> Self {
        Self {
            value: value.into(),
            hash_code,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn hash_code(&self) -> u32 {
        self.hash_code
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.value, self.hash_code)
    }
}
