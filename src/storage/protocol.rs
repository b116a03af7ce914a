//! Bucket Facade Protocol
//!
//! Paths and Data Transfer Objects (DTOs) of the HTTP facade through which a node
//! exposes its buckets, and through which other nodes forward bucket operations.
//!
//! Every path segment taken from user input is percent-escaped.

use crate::keys::Key;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Prefix shared by all bucket routes.
pub const API_PREFIX: &str = "/api/v1/bucket";
/// Route for reading or deleting a key.
pub const ROUTE_KEY: &str = "/api/v1/bucket/:namespace/key/:key";
/// Route for inserting a new key.
pub const ROUTE_ADD: &str = "/api/v1/bucket/:namespace/key/:key/add";
/// Route for updating an existing key.
pub const ROUTE_UPDATE: &str = "/api/v1/bucket/:namespace/key/:key/update";
/// Route for writing a key whether or not it exists.
pub const ROUTE_OVERWRITE: &str = "/api/v1/bucket/:namespace/key/:key/overwrite";
/// Route for listing the keys of one bucket.
pub const ROUTE_LIST: &str = "/api/v1/bucket/:namespace/list/:bucket_id";

/// The three write flavours of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Add,
    Update,
    Overwrite,
}

impl WriteOperation {
    pub fn path_segment(self) -> &'static str {
        match self {
            WriteOperation::Add => "add",
            WriteOperation::Update => "update",
            WriteOperation::Overwrite => "overwrite",
        }
    }
}

/// `api/v1/bucket/{namespace}/key/{key}` (relative, for joining onto a base URL).
pub fn key_path(namespace: &str, key: &str) -> String {
    format!(
        "{}/{}/key/{}",
        API_PREFIX.trim_start_matches('/'),
        urlencoding::encode(namespace),
        urlencoding::encode(key)
    )
}

/// `api/v1/bucket/{namespace}/key/{key}/{add|update|overwrite}`.
pub fn write_path(namespace: &str, key: &str, operation: WriteOperation) -> String {
    format!("{}/{}", key_path(namespace, key), operation.path_segment())
}

/// `api/v1/bucket/{namespace}/list/{bucket_id}`.
pub fn list_path(namespace: &str, bucket_id: u32) -> String {
    format!(
        "{}/{}/list/{}",
        API_PREFIX.trim_start_matches('/'),
        urlencoding::encode(namespace),
        bucket_id
    )
}

// --- Data Transfer Objects ---

/// Body of every write request: `{key, value}`.
///
/// The key travels for reference only; the receiving node re-derives it from the path.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub key: Option<Key>,
    pub value: serde_json::Value,
}

/// Response of the list endpoint: `{"Keys": [...]}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyListResponse {
    #[serde(rename = "Keys", alias = "keys", default)]
    pub keys: Vec<Key>,
}

/// Error body returned by the facade.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
