//! Object store and DNS provider traits plus shared types.
//!
//! The [`ObjectStore`] trait is the bucket surface the publisher needs:
//! bucket existence, creation, policy and website configuration, and object
//! put/get/list/delete. [`DnsProvider`] covers hosted zones and alias records.
//!
//! Two implementations ship with the crate:
//! [`DirectoryStore`](super::directory::DirectoryStore), which maps buckets
//! onto sub-directories of a local root, and
//! [`MemoryStore`](super::memory::MemoryStore), which keeps everything in
//! process memory.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store error: {0}")]
    Other(String),
}

/// Website-mode configuration of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WebsiteConfig {
    /// Serve objects, with fixed index and error documents.
    Website {
        index_document: String,
        error_document: String,
    },
    /// Redirect every request to another host.
    Redirect { host_name: String, protocol: String },
}

impl WebsiteConfig {
    pub fn website(index_document: &str, error_document: &str) -> Self {
        WebsiteConfig::Website {
            index_document: index_document.to_string(),
            error_document: error_document.to_string(),
        }
    }

    pub fn redirect(host_name: &str) -> Self {
        WebsiteConfig::Redirect {
            host_name: host_name.to_string(),
            protocol: "http".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    /// Domain name as the provider reports it, possibly with a trailing dot.
    pub name: String,
}

/// An `A` alias record pointing a domain at a website endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub name: String,
    pub target: String,
}

/// Bucket operations the publisher relies on.
///
/// Implementations are shared by the upload worker pool, hence `Send + Sync`.
pub trait ObjectStore: Send + Sync {
    /// Succeeds when the bucket exists and is accessible.
    fn head_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Create a bucket. Creating an existing bucket is a no-op.
    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError>;

    fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> Result<(), StoreError>;

    /// `Ok(None)` when the bucket exists but has no website configuration.
    fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, StoreError>;

    /// Write an object, overwriting any existing one under the same key.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Every key in the bucket, sorted.
    fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError>;

    /// Delete a batch of keys. Missing keys are not an error.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError>;
}

/// Hosted zone and record management.
pub trait DnsProvider: Send + Sync {
    fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, StoreError>;

    fn create_hosted_zone(&self, domain: &str) -> Result<HostedZone, StoreError>;

    /// Create or replace the given records in a zone.
    fn upsert_alias_records(&self, zone_id: &str, records: &[AliasRecord])
    -> Result<(), StoreError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::hosting::memory::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        PutObject(String),
        GetObject(String),
        DeleteObjects(Vec<String>),
    }

    /// Wraps a [`MemoryStore`], recording object operations and failing
    /// selected keys. Uses Mutex so it is Sync and works with rayon.
    #[derive(Default)]
    pub struct RecordingStore {
        pub inner: MemoryStore,
        pub operations: Mutex<Vec<RecordedOp>>,
        pub failing_puts: Mutex<HashSet<String>>,
        pub fail_deletes: Mutex<bool>,
    }

    impl RecordingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_put(&self, key: &str) {
            self.failing_puts.lock().unwrap().insert(key.to_string());
        }

        pub fn fail_all_deletes(&self) {
            *self.fail_deletes.lock().unwrap() = true;
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn delete_batches(&self) -> Vec<Vec<String>> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::DeleteObjects(keys) => Some(keys),
                    _ => None,
                })
                .collect()
        }
    }

    impl ObjectStore for RecordingStore {
        fn head_bucket(&self, bucket: &str) -> Result<(), StoreError> {
            self.inner.head_bucket(bucket)
        }

        fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
            self.inner.create_bucket(bucket)
        }

        fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError> {
            self.inner.put_bucket_policy(bucket, policy)
        }

        fn put_bucket_website(
            &self,
            bucket: &str,
            config: &WebsiteConfig,
        ) -> Result<(), StoreError> {
            self.inner.put_bucket_website(bucket, config)
        }

        fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, StoreError> {
            self.inner.get_bucket_website(bucket)
        }

        fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: &[u8],
            content_type: &str,
        ) -> Result<(), StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::PutObject(key.to_string()));
            if self.failing_puts.lock().unwrap().contains(key) {
                return Err(StoreError::Other(format!("refused {key}")));
            }
            self.inner.put_object(bucket, key, body, content_type)
        }

        fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::GetObject(key.to_string()));
            self.inner.get_object(bucket, key)
        }

        fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list_objects(bucket)
        }

        fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::DeleteObjects(keys.to_vec()));
            if *self.fail_deletes.lock().unwrap() {
                return Err(StoreError::Other("delete refused".to_string()));
            }
            self.inner.delete_objects(bucket, keys)
        }
    }

    #[test]
    fn website_config_serializes_with_mode_tag() {
        let json = serde_json::to_value(WebsiteConfig::website("index.html", "error.html")).unwrap();
        assert_eq!(json["mode"], "website");
        assert_eq!(json["index_document"], "index.html");

        let redirect = serde_json::to_value(WebsiteConfig::redirect("example.com")).unwrap();
        assert_eq!(redirect["mode"], "redirect");
        assert_eq!(redirect["protocol"], "http");
    }
}
