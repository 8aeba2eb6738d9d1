//! Blob storage for uploaded images.
//!
//! The proxy only ever hands image bytes through to the model provider,
//! so the storage contract is minimal: write a blob and get a durable
//! URI back, list a prefix, delete a key.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use uuid::Uuid;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key` and return a durable `scheme://bucket/path`
    /// style URI for it.
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String, AppError>;

    /// Remove the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// All keys under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String, AppError> {
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(format!("file://{}/{}", self.base_path.display(), key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.base_path.join(key);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let dir = self.base_path.join(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                keys.push(format!(
                    "{}{}",
                    prefix,
                    entry.file_name().to_string_lossy()
                ));
            }
        }
        Ok(keys)
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 upload failed: {}", e)))?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 list failed: {}", e)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}

/// Uploaded-image store: names blobs, bounds concurrent blob operations,
/// and owns the image prefix used by reset cleanup.
pub struct ImageStore {
    storage: Arc<dyn Storage>,
    prefix: String,
    limiter: Arc<Semaphore>,
}

impl ImageStore {
    pub fn new(storage: Arc<dyn Storage>, prefix: String, pool_size: usize) -> Self {
        Self {
            storage,
            prefix,
            limiter: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Store one uploaded image under a freshly generated name that keeps
    /// the original filename's extension, and return its URI.
    pub async fn store(&self, filename: &str, data: Vec<u8>) -> Result<String, AppError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let key = format!("{}/{}.{}", self.prefix, Uuid::new_v4(), extension);

        tracing::info!(key = %key, size = data.len(), "storing uploaded image");
        self.storage.upload(&key, data).await
    }

    /// Delete every stored image. Returns how many objects were removed.
    pub async fn purge(&self) -> Result<usize, AppError> {
        let keys = self.storage.list(&format!("{}/", self.prefix)).await?;
        let total = keys.len();

        for key in keys {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
            self.storage.delete(&key).await?;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn image_store() -> (ImageStore, String) {
        let base = format!("target/test-storage-{}", Uuid::new_v4());
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&base).await.unwrap());
        (ImageStore::new(storage, "images".to_string(), 10), base)
    }

    #[tokio::test]
    async fn store_keeps_extension_and_generates_fresh_name() {
        let (store, base) = image_store().await;

        let uri = store
            .store("photo.png", vec![1, 2, 3])
            .await
            .expect("store failed");

        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with(".png"));
        assert!(!uri.contains("photo"));
        assert!(uri.contains("/images/"));

        let _ = tokio::fs::remove_dir_all(&base).await;
    }

    #[tokio::test]
    async fn store_falls_back_to_bin_extension() {
        let (store, base) = image_store().await;

        let uri = store.store("snapshot", vec![0]).await.expect("store failed");
        assert!(uri.ends_with(".bin"));

        let _ = tokio::fs::remove_dir_all(&base).await;
    }

    #[tokio::test]
    async fn purge_removes_every_stored_image() {
        let (store, base) = image_store().await;

        store.store("a.jpg", vec![1]).await.unwrap();
        store.store("b.jpg", vec![2]).await.unwrap();

        assert_eq!(store.purge().await.unwrap(), 2);
        assert_eq!(store.purge().await.unwrap(), 0);

        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
