//! Buckets owned by another node, reached through its HTTP facade.

use super::bucket::{Bucket, cancellable};
use super::locator::{BucketLocator, check_bucket_count, check_bucket_id};
use super::protocol::{KeyListResponse, WriteOperation, WriteRequest, key_path, list_path, write_path};
use crate::error::StorageError;
use crate::keys::Key;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct RemoteBucket {
    client: reqwest::Client,
    base_url: Url,
    namespace: Key,
    bucket_id: u32,
}

impl RemoteBucket {
    pub fn new(client: reqwest::Client, base_url: Url, namespace: Key, bucket_id: u32) -> Self {
        Self {
            client,
            base_url,
            namespace,
            bucket_id,
        }
    }

    fn url(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(path)
            .map_err(|e| StorageError::Remote(format!("invalid url for {}: {}", path, e)))
    }

    async fn write(&self, key: &Key, value: Value, operation: WriteOperation) -> Result<Value, StorageError> {
        let url = self.url(&write_path(self.namespace.value(), key.value(), operation))?;
        let payload = WriteRequest {
            key: Some(key.clone()),
            value,
        };

        tracing::debug!("Forwarding {:?} of {} to {}", operation, key.value(), url);

        let response = self.client.post(url).json(&payload).send().await?;
        match response.status() {
            StatusCode::CONFLICT => Err(StorageError::AlreadyExists(key.value().to_string())),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.value().to_string())),
            _ => Ok(response.error_for_status()?.json().await?),
        }
    }

    async fn fetch(&self, key: &Key) -> Result<Option<Value>, StorageError> {
        let url = self.url(&key_path(self.namespace.value(), key.value()))?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    async fn delete(&self, key: &Key) -> Result<(), StorageError> {
        let url = self.url(&key_path(self.namespace.value(), key.value()))?;
        self.client.delete(url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn fetch_keys(&self) -> Result<Vec<Key>, StorageError> {
        let url = self.url(&list_path(self.namespace.value(), self.bucket_id))?;
        let listing: KeyListResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing.keys)
    }
}

#[async_trait]
impl Bucket for RemoteBucket {
    fn bucket_id(&self) -> u32 {
        self.bucket_id
    }

    async fn get(&self, key: &Key, cancel: &CancellationToken) -> Result<Option<Value>, StorageError> {
        cancellable(cancel, self.fetch(key)).await
    }

    async fn add(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError> {
        cancellable(cancel, self.write(key, value, WriteOperation::Add)).await
    }

    async fn update(&self, key: &Key, value: Value, cancel: &CancellationToken) -> Result<Value, StorageError> {
        cancellable(cancel, self.write(key, value, WriteOperation::Update)).await
    }

    async fn add_or_update(
        &self,
        key: &Key,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, StorageError> {
        cancellable(cancel, self.write(key, value, WriteOperation::Overwrite)).await
    }

    async fn remove(&self, key: &Key, cancel: &CancellationToken) -> Result<(), StorageError> {
        cancellable(cancel, self.delete(key)).await
    }

    async fn list_keys(&self, cancel: &CancellationToken) -> Result<Vec<Key>, StorageError> {
        cancellable(cancel, self.fetch_keys()).await
    }
}

/// Resolves every bucket to the facade of one remote node.
pub struct RemoteBucketLocator {
    client: reqwest::Client,
    base_url: Url,
    bucket_count: u32,
}

impl RemoteBucketLocator {
    pub fn new(base_url: Url, bucket_count: u32) -> Result<Self, StorageError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            bucket_count: check_bucket_count(bucket_count)?,
        })
    }
}

#[async_trait]
impl BucketLocator for RemoteBucketLocator {
    fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    async fn resolve(&self, namespace: &Key, bucket_id: u32) -> Result<Arc<dyn Bucket>, StorageError> {
        check_bucket_id(bucket_id, self.bucket_count)?;
        let bucket: Arc<dyn Bucket> = Arc::new(RemoteBucket::new(
            self.client.clone(),
            self.base_url.clone(),
            namespace.clone(),
            bucket_id,
        ));
        Ok(bucket)
    }
}
