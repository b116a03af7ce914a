//! File-per-key bucket backend.
//!
//! Each key is stored as `<bucket dir>/<key>.json`. Writes go to a temporary
//! file first and are renamed into place, so a reader never sees a partially
//! written value. Operations on the same key are serialized inside this
//! process; separate processes sharing a directory are still last writer wins.

use super::bucket::{Bucket, METADATA_FIELD, cancellable};
use crate::error::StorageError;
use crate::keys::{Key, KeyHasher};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

pub struct FilesystemBucket {
    base_path: PathBuf,
    bucket_id: u32,
    hasher: Arc<dyn KeyHasher>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FilesystemBucket {
    /// `base_path` must already exist; the locator creates it.
    pub fn new(base_path: PathBuf, bucket_id: u32, hasher: Arc<dyn KeyHasher>) -> Self {
        Self {
            base_path,
            bucket_id,
            hasher,
            key_locks: DashMap::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, key: &Key) -> PathBuf {
        self.base_path
            .join(format!("{}.{}", key.value(), VALUE_EXTENSION))
    }

    fn temp_path(&self, key: &Key) -> PathBuf {
        self.base_path.join(format!("{}.{}", key.value(), TEMP_EXTENSION))
    }

    fn key_lock(&self, key: &Key) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key.value().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn with_key_lock<T, F>(&self, key: &Key, operation: F) -> Result<T, StorageError>
    where
        F: std::future::Future<Output = Result<T, StorageError>>,
    {
        // Dropped last, after the lock below, also when the future is cancelled.
        let _cleanup = KeyLockCleanup {
            locks: &self.key_locks,
            key: key.value(),
        };
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        operation.await
    }

    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.file_path(key)).await?)
    }

    fn metadata(&self, key: &Key) -> Value {
        json!({
            "id": key.value(),
            "hashCode": key.hash_code(),
            "modified": now_ms(),
            "bucket": self.bucket_id,
        })
    }

    async fn write_value(&self, key: &Key, mut value: Value) -> Result<Value, StorageError> {
        if let Value::Object(object) = &mut value {
            object.insert(METADATA_FIELD.to_string(), self.metadata(key));
        }

        let encoded = serde_json::to_vec(&value)?;
        let temp_path = self.temp_path(key);
        tokio::fs::write(&temp_path, &encoded).await?;
        tokio::fs::rename(&temp_path, self.file_path(key)).await?;

        tracing::debug!(
            "Wrote key {} to bucket {} ({} bytes)",
            key.value(),
            self.bucket_id,
            encoded.len()
        );
        Ok(value)
    }

    async fn read_value(&self, key: &Key) -> Result<Option<Value>, StorageError> {
        match tokio::fs::read(self.file_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan_keys(&self) -> Result<Vec<Key>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.hasher.compute_hash(stem) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    tracing::warn!("Skipping file {:?} in bucket {}: {}", path, self.bucket_id, e);
                }
            }
        }

        keys.sort_by(|a, b| a.value().cmp(b.value()));
        Ok(keys)
    }
}

#[async_trait]
impl Bucket for FilesystemBucket {
    fn bucket_id(&self) -> u32 {
        self.bucket_id
    }

    async fn get(&self, key: &Key, cancel: &CancellationToken) -> Result<Option<Value>, StorageError> {
        cancellable(cancel, self.read_value(key)).await
    }

    async fn add(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError> {
        cancellable(
            cancel,
            self.with_key_lock(key, async {
                if self.exists(key).await? {
                    return Err(StorageError::AlreadyExists(key.value().to_string()));
                }
                self.write_value(key, value).await
            }),
        )
        .await
    }

    async fn update(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError> {
        cancellable(
            cancel,
            self.with_key_lock(key, async {
                if !self.exists(key).await? {
                    return Err(StorageError::NotFound(key.value().to_string()));
                }
                self.write_value(key, value).await
            }),
        )
        .await
    }

    async fn add_or_update(
        &self,
        key: &Key,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, StorageError> {
        cancellable(cancel, self.with_key_lock(key, self.write_value(key, value))).await
    }

    async fn remove(&self, key: &Key, cancel: &CancellationToken) -> Result<(), StorageError> {
        cancellable(
            cancel,
            self.with_key_lock(key, async {
                match tokio::fs::remove_file(self.file_path(key)).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }),
        )
        .await
    }

    async fn list_keys(&self, cancel: &CancellationToken) -> Result<Vec<Key>, StorageError> {
        cancellable(cancel, self.scan_keys()).await
    }
}

/// Drops a key's lock entry once no other operation holds it.
struct KeyLockCleanup<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
}

impl Drop for KeyLockCleanup<'_> {
    fn drop(&mut self) {
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
