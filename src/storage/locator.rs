use super::bucket::Bucket;
use super::filesystem::FilesystemBucket;
use crate::error::StorageError;
use crate::keys::{Key, KeyHasher};

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of buckets per namespace.
pub const DEFAULT_BUCKET_COUNT: u32 = 65_536;

/// Routes keys to buckets and buckets to storage backends.
#[async_trait]
pub trait BucketLocator: Send + Sync {
    fn bucket_count(&self) -> u32;

    /// Bucket for a hash code: `hash_code % bucket_count`. The namespace does
    /// not influence the bucket id, only which backend it resolves to.
    fn bucket_for_hash(&self, _namespace: &Key, hash_code: u32) -> u32 {
        hash_code % self.bucket_count()
    }

    fn bucket_for_key(&self, namespace: &Key, key: &Key) -> u32 {
        self.bucket_for_hash(namespace, key.hash_code())
    }

    /// Resolves the backend for `(namespace, bucket_id)`. The same pair always
    /// resolves to the same backend; distinct pairs never share one.
    async fn resolve(&self, namespace: &Key, bucket_id: u32) -> Result<Arc<dyn Bucket>, StorageError>;

    async fn bucket(&self, namespace: &Key, key: &Key) -> Result<Arc<dyn Bucket>, StorageError> {
        let bucket_id = self.bucket_for_key(namespace, key);
        self.resolve(namespace, bucket_id).await
    }
}

pub(crate) fn check_bucket_count(bucket_count: u32) -> Result<u32, StorageError> {
    if bucket_count == 0 {
        return Err(StorageError::InvalidBucketCount);
    }
    Ok(bucket_count)
}

pub(crate) fn check_bucket_id(bucket_id: u32, bucket_count: u32) -> Result<(), StorageError> {
    if bucket_id >= bucket_count {
        return Err(StorageError::BucketOutOfRange {
            bucket: bucket_id,
            count: bucket_count,
        });
    }
    Ok(())
}

/// Stores buckets as directories: `<root>/<namespace hash>/<namespace>/<bucket id>/`.
pub struct FilesystemBucketLocator {
    bucket_count: u32,
    hasher: Arc<dyn KeyHasher>,
    root: PathBuf,
    resolved: DashMap<(String, u32, u32), Arc<FilesystemBucket>>,
}

impl FilesystemBucketLocator {
    /// Creates the root directory if needed.
    pub fn new(
        hasher: Arc<dyn KeyHasher>,
        root: impl AsRef<Path>,
        bucket_count: u32,
    ) -> Result<Self, StorageError> {
        let bucket_count = check_bucket_count(bucket_count)?;
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;

        tracing::info!(
            "Filesystem bucket store at {:?} with {} buckets per namespace",
            root,
            bucket_count
        );

        Ok(Self {
            bucket_count,
            hasher,
            root,
            resolved: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, namespace: &Key, bucket_id: u32) -> PathBuf {
        self.root
            .join(namespace.hash_code().to_string())
            .join(namespace.value())
            .join(bucket_id.to_string())
    }
}

#[async_trait]
impl BucketLocator for FilesystemBucketLocator {
    fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    async fn resolve(&self, namespace: &Key, bucket_id: u32) -> Result<Arc<dyn Bucket>, StorageError> {
        check_bucket_id(bucket_id, self.bucket_count)?;

        let cache_key = (namespace.value().to_string(), namespace.hash_code(), bucket_id);
        if let Some(bucket) = self.resolved.get(&cache_key) {
            let bucket: Arc<dyn Bucket> = bucket.value().clone();
            return Ok(bucket);
        }

        let path = self.bucket_path(namespace, bucket_id);
        tokio::fs::create_dir_all(&path).await?;

        let bucket: Arc<dyn Bucket> = self
            .resolved
            .entry(cache_key)
            .or_insert_with(|| {
                tracing::debug!(
                    "Resolved bucket {} of namespace {} at {:?}",
                    bucket_id,
                    namespace.value(),
                    path
                );
                Arc::new(FilesystemBucket::new(path, bucket_id, self.hasher.clone()))
            })
            .clone();

        Ok(bucket)
    }
}
