use super::types::Key;
use super::validator::{KeyValidator, PatternKeyValidator};
use crate::error::KeyError;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const DIGEST_WORDS: usize = 8;
const FOLD_MULTIPLIER: u32 = 31;

/// Produces durable [`Key`]s from raw strings.
pub trait KeyHasher: Send + Sync {
    fn compute_hash(&self, key: &str) -> Result<Key, KeyError>;
}

/// Hashes keys by folding the SHA-256 digests of the key and of its reverse.
///
/// The hash code is part of the on-disk addressing scheme: it selects the
/// bucket a key lives in. It must never change for a given string.
#[derive(Clone)]
pub struct Sha256KeyHasher {
    validator: Arc<dyn KeyValidator>,
}

impl Sha256KeyHasher {
    pub fn new(validator: Arc<dyn KeyValidator>) -> Self {
        Self { validator }
    }
}

impl Default for Sha256KeyHasher {
    fn default() -> Self {
        Self::new(Arc::new(PatternKeyValidator::new()))
    }
}

impl KeyHasher for Sha256KeyHasher {
    fn compute_hash(&self, key: &str) -> Result<Key, KeyError> {
        self.validator.validate(key)?;

        let forward = Sha256::digest(key.as_bytes());
        let reversed: String = key.chars().rev().collect();
        let backward = Sha256::digest(reversed.as_bytes());

        let hash_code = (key.len() as u32)
            .wrapping_mul(FOLD_MULTIPLIER)
            .wrapping_add(fold_digest(&forward).wrapping_mul(FOLD_MULTIPLIER))
            .wrapping_add(fold_digest(&backward));

        tracing::trace!("Hashed key {} -> {}", key, hash_code);

        Ok(Key::new(key, hash_code))
    }
}

/// Folds a 32 byte digest into a `u32` with a rolling `acc * 31 + word`.
pub(crate) fn fold_digest(digest: &[u8]) -> u32 {
    fold_with_host_order(digest, cfg!(target_endian = "little"))
}

/// Same fold, with the host byte order made explicit so both paths can be exercised.
pub(crate) fn fold_with_host_order(digest: &[u8], little_endian_host: bool) -> u32 {
    digest
        .chunks_exact(4)
        .take(DIGEST_WORDS)
        .map(|chunk| {
            let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            word_from_host(bytes, little_endian_host)
        })
        .fold(0u32, |acc, word| {
            acc.wrapping_mul(FOLD_MULTIPLIER).wrapping_add(word)
        })
}

/// Reads a digest word as little-endian. A big-endian host reverses the bytes
/// before its native read, so both hosts land on the same value.
fn word_from_host(mut bytes: [u8; 4], little_endian_host: bool) -> u32 {
    if little_endian_host {
        u32::from_le_bytes(bytes)
    } else {
        bytes.reverse();
        u32::from_be_bytes(bytes)
    }
}
