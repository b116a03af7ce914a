use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::bucket::Bucket;
use super::locator::BucketLocator;
use super::protocol::{
    ErrorResponse, KeyListResponse, ROUTE_ADD, ROUTE_KEY, ROUTE_LIST, ROUTE_OVERWRITE,
    ROUTE_UPDATE, WriteOperation, WriteRequest,
};
use crate::error::StorageError;
use crate::keys::{Key, KeyHasher};

/// What the facade handlers need: a hasher for path keys and the local locator.
pub struct StorageContext {
    pub hasher: Arc<dyn KeyHasher>,
    pub locator: Arc<dyn BucketLocator>,
}

/// Routes of the bucket facade, bound to `context`.
pub fn router(context: Arc<StorageContext>) -> Router {
    Router::new()
        .route(ROUTE_KEY, get(handle_get).delete(handle_remove))
        .route(ROUTE_ADD, post(handle_add))
        .route(ROUTE_UPDATE, post(handle_update))
        .route(ROUTE_OVERWRITE, post(handle_overwrite))
        .route(ROUTE_LIST, get(handle_list))
        .layer(Extension(context))
}

/// Maps storage conditions onto facade status codes.
pub fn status_for(error: &StorageError) -> StatusCode {
    match error {
        StorageError::Key(_) | StorageError::BucketOutOfRange { .. } => StatusCode::BAD_REQUEST,
        StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Remote(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: StorageError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Bucket operation failed: {}", error);
    } else {
        tracing::debug!("Bucket operation rejected: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn locate(
    context: &StorageContext,
    namespace: &str,
    key: &str,
) -> Result<(Key, Arc<dyn Bucket>), StorageError> {
    let namespace = context.hasher.compute_hash(namespace)?;
    let key = context.hasher.compute_hash(key)?;
    let bucket = context.locator.bucket(&namespace, &key).await?;
    Ok((key, bucket))
}

async fn write(
    context: &StorageContext,
    namespace: &str,
    key: &str,
    value: Value,
    operation: WriteOperation,
) -> Result<Value, StorageError> {
    let (key, bucket) = locate(context, namespace, key).await?;
    let cancel = CancellationToken::new();
    match operation {
        WriteOperation::Add => bucket.add(&key, value, &cancel).await,
        WriteOperation::Update => bucket.update(&key, value, &cancel).await,
        WriteOperation::Overwrite => bucket.add_or_update(&key, value, &cancel).await,
    }
}

async fn write_response(
    context: Arc<StorageContext>,
    namespace: String,
    key: String,
    req: WriteRequest,
    operation: WriteOperation,
) -> Response {
    match write(&context, &namespace, &key, req.value, operation).await {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_add(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Response {
    write_response(context, namespace, key, req, WriteOperation::Add).await
}

pub async fn handle_update(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Response {
    write_response(context, namespace, key, req, WriteOperation::Update).await
}

pub async fn handle_overwrite(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Response {
    write_response(context, namespace, key, req, WriteOperation::Overwrite).await
}

pub async fn handle_get(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, key)): Path<(String, String)>,
) -> Response {
    let result: Result<Option<Value>, StorageError> = async {
        let (key, bucket) = locate(&context, &namespace, &key).await?;
        bucket.get(&key, &CancellationToken::new()).await
    }
    .await;

    match result {
        Ok(Some(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_remove(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, key)): Path<(String, String)>,
) -> Response {
    let result: Result<(), StorageError> = async {
        let (key, bucket) = locate(&context, &namespace, &key).await?;
        bucket.remove(&key, &CancellationToken::new()).await
    }
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_list(
    Extension(context): Extension<Arc<StorageContext>>,
    Path((namespace, bucket_id)): Path<(String, u32)>,
) -> Response {
    let result: Result<Vec<Key>, StorageError> = async {
        let namespace = context.hasher.compute_hash(&namespace)?;
        let bucket = context.locator.resolve(&namespace, bucket_id).await?;
        bucket.list_keys(&CancellationToken::new()).await
    }
    .await;

    match result {
        Ok(keys) => (StatusCode::OK, Json(KeyListResponse { keys })).into_response(),
        Err(e) => error_response(e),
    }
}
