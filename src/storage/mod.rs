//! Bucket Storage Module
//!
//! Maps keys to buckets and buckets to concrete storage backends.
//!
//! ## Core Concepts
//! - **Bucketing**: A key belongs to bucket `hash_code % bucket_count`. The count is fixed for the
//!   lifetime of a store; changing it moves every key.
//! - **Namespaces**: Each namespace has its own independent set of buckets.
//! - **Backends**: A `BucketLocator` resolves `(namespace, bucket)` to a `Bucket` handle, either a
//!   directory on local disk (`FilesystemBucket`) or another node's HTTP facade (`RemoteBucket`).
//! - **Facade**: `handlers` exposes local buckets over HTTP with the same contract `RemoteBucket` speaks.

pub mod bucket;
pub mod filesystem;
pub mod handlers;
pub mod locator;
pub mod protocol;
pub mod remote;

pub use bucket::Bucket;
pub use filesystem::FilesystemBucket;
pub use locator::{BucketLocator, FilesystemBucketLocator};
pub use remote::{RemoteBucket, RemoteBucketLocator};
