//! Object storage for avatars, pin images and audio
//!
//! The hosted service exposes an S3-compatible endpoint; [`S3Storage`] talks
//! to it through the AWS SDK. [`MemoryStorage`] keeps objects in process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use axum::body::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::settings::StorageConfig;

/// Errors raised by object storage
#[derive(Error, Debug)]
pub enum StorageError {
    /// An object already exists under the key and overwriting was not allowed
    #[error("Object {0} already exists")]
    AlreadyExists(String),

    /// The storage backend failed
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Bucket names for each kind of media
#[derive(Debug, Clone)]
pub struct Buckets {
    pub avatars: String,
    pub images: String,
    pub audio: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            avatars: "avatars".to_string(),
            images: "images".to_string(),
            audio: "audio".to_string(),
        }
    }
}

impl From<&StorageConfig> for Buckets {
    fn from(config: &StorageConfig) -> Self {
        Self {
            avatars: config.avatar_bucket.clone(),
            images: config.image_bucket.clone(),
            audio: config.audio_bucket.clone(),
        }
    }
}

/// An object to store
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub body: Bytes,
    pub content_type: &'a str,
    /// Replace an existing object instead of failing
    pub upsert: bool,
}

/// Key/value object storage with public URLs
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object and return its public URL
    async fn put(&self, object: PutObject<'_>) -> Result<String, StorageError>;

    /// Delete an object; deleting a missing object is not an error
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Public URL of an object
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Recover `(bucket, key)` from a URL returned by [`ObjectStorage::put`]
    fn locate(&self, url: &str) -> Option<(String, String)>;
}

fn join_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

fn split_url(base: &str, url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix(base.trim_end_matches('/'))?.strip_prefix('/')?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}

/// Storage backed by an S3-compatible endpoint
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    public_url: String,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "pindrop",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!("S3 storage client initialized for {}", config.endpoint);
        Self {
            client: Client::from_conf(s3_config),
            public_url: config.public_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, object: PutObject<'_>) -> Result<String, StorageError> {
        let request = self
            .client
            .put_object()
            .bucket(object.bucket)
            .key(object.key)
            .content_type(object.content_type)
            .body(ByteStream::from(object.body))
            // Without upsert the write only succeeds when nothing is stored yet.
            .set_if_none_match((!object.upsert).then(|| "*".to_string()));

        request.send().await.map_err(|e| {
            let precondition_failed = e
                .raw_response()
                .map(|r| r.status().as_u16() == 412)
                .unwrap_or(false);
            if precondition_failed {
                StorageError::AlreadyExists(object.key.to_string())
            } else {
                StorageError::Backend(DisplayErrorContext(&e).to_string())
            }
        })?;

        Ok(self.public_url(object.bucket, object.key))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_url(&self.public_url, bucket, key)
    }

    fn locate(&self, url: &str) -> Option<(String, String)> {
        split_url(&self.public_url, url)
    }
}

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Storage keeping objects in process memory
pub struct MemoryStorage {
    public_url: String,
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            objects: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of put/remove calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, object: PutObject<'_>) -> Result<String, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = (object.bucket.to_string(), object.key.to_string());
        let mut objects = self.objects.write().await;
        if !object.upsert && objects.contains_key(&id) {
            return Err(StorageError::AlreadyExists(object.key.to_string()));
        }
        objects.insert(
            id,
            StoredObject {
                body: object.body,
                content_type: object.content_type.to_string(),
            },
        );
        Ok(self.public_url(object.bucket, object.key))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_url(&self.public_url, bucket, key)
    }

    fn locate(&self, url: &str) -> Option<(String, String)> {
        split_url(&self.public_url, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object<'a>(key: &'a str, upsert: bool) -> PutObject<'a> {
        PutObject {
            bucket: "images",
            key,
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png",
            upsert,
        }
    }

    #[test]
    fn urls_round_trip() {
        let base = "http://localhost:54321/storage/v1/object/public/";
        let url = join_url(base, "images", "walker/image-1-abc.png");
        assert_eq!(
            url,
            "http://localhost:54321/storage/v1/object/public/images/walker/image-1-abc.png"
        );
        assert_eq!(
            split_url(base, &url),
            Some(("images".to_string(), "walker/image-1-abc.png".to_string()))
        );
        assert_eq!(split_url(base, "https://elsewhere.example/images/a.png"), None);
    }

    #[tokio::test]
    async fn memory_storage_prevents_overwrite_unless_upsert() {
        let storage = MemoryStorage::new("http://files");

        let url = storage.put(object("a.png", false)).await.unwrap();
        assert_eq!(url, "http://files/images/a.png");

        assert!(matches!(
            storage.put(object("a.png", false)).await,
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(storage.put(object("a.png", true)).await.is_ok());
        assert_eq!(storage.len().await, 1);

        storage.remove("images", "a.png").await.unwrap();
        assert!(storage.is_empty().await);
        assert_eq!(storage.calls(), 4);
    }
}
