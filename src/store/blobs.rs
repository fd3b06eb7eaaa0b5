/// Blob store interface
///
/// Key-addressed binary storage for the PNG bytes behind each record.
/// Retrieval is URL-based: `download_url` hands out a time-limited link
/// rather than the bytes themselves, and callers cache it per path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long an issued download URL stays valid.
const URL_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("no blob at {0}")]
    NotFound(String),
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Upload metadata stored alongside the bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub content_type: String,
    pub cache_control: String,
}

impl BlobMeta {
    /// Metadata for card uploads: PNG with a long-lived public cache.
    pub fn png() -> Self {
        BlobMeta {
            content_type: "image/png".to_string(),
            cache_control: "public,max-age=31536000".to_string(),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write (or overwrite) the blob at `path`.
    async fn put(&self, path: &str, bytes: Vec<u8>, meta: BlobMeta) -> Result<(), BlobError>;

    /// Delete the blob at `path`. A missing blob is `BlobError::NotFound`;
    /// best-effort callers swallow that.
    async fn remove(&self, path: &str) -> Result<(), BlobError>;

    /// Resolve a time-limited download URL for an existing blob.
    async fn download_url(&self, path: &str) -> Result<String, BlobError>;
}

/// Filesystem-backed blob store. Bytes land under a root directory with
/// a `.meta.json` sidecar per blob; URLs are `file://` links carrying an
/// `expires` query parameter.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the store at the default cache location
    /// (e.g. ~/.cache/card-gallery/blobs on Linux).
    pub fn open() -> Result<Self, BlobError> {
        let mut root = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine cache directory");
        root.push("card-gallery");
        root.push("blobs");
        let store = Self::open_at(&root)?;
        println!("📦 Blob store initialized at: {}", root.display());
        Ok(store)
    }

    /// Open the store rooted at an explicit directory, creating it if needed.
    pub fn open_at(root: &Path) -> Result<Self, BlobError> {
        std::fs::create_dir_all(root)?;
        Ok(FsBlobStore {
            root: std::fs::canonicalize(root)?,
        })
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn meta_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", path))
    }

    /// Read back the sidecar metadata for a stored blob.
    pub async fn meta(&self, path: &str) -> Result<BlobMeta, BlobError> {
        let raw = tokio::fs::read(self.meta_path(path))
            .await
            .map_err(|_| BlobError::NotFound(path.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, meta: BlobMeta) -> Result<(), BlobError> {
        let full = self.blob_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        tokio::fs::write(self.meta_path(path), serde_json::to_vec(&meta)?).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), BlobError> {
        let full = self.blob_path(path);
        tokio::fs::remove_file(&full)
            .await
            .map_err(|_| BlobError::NotFound(path.to_string()))?;
        // Sidecar may legitimately be gone already
        let _ = tokio::fs::remove_file(self.meta_path(path)).await;
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, BlobError> {
        let full = self.blob_path(path);
        tokio::fs::metadata(&full)
            .await
            .map_err(|_| BlobError::NotFound(path.to_string()))?;

        let expires = Utc::now().timestamp() + URL_TTL_SECS;
        Ok(format!("file://{}?expires={}", full.display(), expires))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> FsBlobStore {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "card-gallery-test-{}-{}",
            tag,
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        FsBlobStore::open_at(&dir).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_url_then_remove() {
        let store = temp_store("roundtrip");
        store
            .put("templates/abc.png", vec![1, 2, 3], BlobMeta::png())
            .await
            .unwrap();

        let url = store.download_url("templates/abc.png").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("templates/abc.png?expires="));

        store.remove("templates/abc.png").await.unwrap();
        assert!(matches!(
            store.download_url("templates/abc.png").await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sidecar_metadata() {
        let store = temp_store("meta");
        store
            .put("templates/x.png", vec![0], BlobMeta::png())
            .await
            .unwrap();

        let meta = store.meta("templates/x.png").await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.cache_control, "public,max-age=31536000");
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let store = temp_store("missing");
        assert!(matches!(
            store.remove("templates/nope.png").await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = temp_store("overwrite");
        store
            .put("t/a.png", vec![1], BlobMeta::png())
            .await
            .unwrap();
        store
            .put("t/a.png", vec![2, 3], BlobMeta::png())
            .await
            .unwrap();

        let bytes = tokio::fs::read(store.blob_path("t/a.png")).await.unwrap();
        assert_eq!(bytes, vec![2, 3]);
    }
}
