use crate::error::StorageError;
use crate::keys::Key;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Reserved field merged into stored object values.
pub const METADATA_FIELD: &str = "$_metadata";

/// A single bucket of one namespace.
///
/// Operations are asynchronous and abandon their work with
/// [`StorageError::Cancelled`] once `cancel` fires. Nothing here retries.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn bucket_id(&self) -> u32;

    /// Returns `None` when the key is absent.
    async fn get(&self, key: &Key, cancel: &CancellationToken) -> Result<Option<Value>, StorageError>;

    /// Fails with [`StorageError::AlreadyExists`] if the key is present.
    async fn add(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError>;

    /// Fails with [`StorageError::NotFound`] if the key is absent.
    async fn update(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError>;

    /// Always writes. Object values get a metadata envelope under [`METADATA_FIELD`].
    async fn add_or_update(
        &self,
        key: &Key,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, StorageError>;

    /// Succeeds whether or not the key existed.
    async fn remove(&self, key: &Key, cancel: &CancellationToken) -> Result<(), StorageError>;

    /// Best effort listing of stored keys.
    async fn list_keys(&self, cancel: &CancellationToken) -> Result<Vec<Key>, StorageError>;
}

/// Runs `operation` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    if cancel.is_cancelled() {
        return Err(StorageError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        result = operation => result,
    }
}
