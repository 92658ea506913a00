//! Object-storage collaborator for DA 2062 form images and signature blobs
//! (spec.md §1: object storage itself is out of scope, but the ingestion
//! pipeline needs somewhere to put the scanned form it OCRs). Grounded on
//! the teacher's `crates/s3` `Uploader`/`Config` shape, trimmed to the
//! `put`/`url_for` surface this spec actually calls; the concrete
//! `aws-sdk-s3` backend is left unimplemented since a live bucket is out of
//! scope, the same way `notifications::NullPushSink` stands in for an
//! unimplemented push provider.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("upload failed: {0}")]
    Upload(#[from] anyhow::Error),
}

/// Collaborator boundary for storing and retrieving opaque blobs
/// (scanned forms, signature images) by key.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), Error>;
    async fn url_for(&self, key: &str) -> Result<String, Error>;
}

/// In-memory fake for tests and for running the service without a
/// configured bucket.
#[derive(Default)]
pub struct InMemoryUploader {
    objects: tokio::sync::Mutex<std::collections::HashMap<String, (Vec<u8>, String)>>,
}

#[async_trait]
impl Uploader for InMemoryUploader {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), Error> {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn url_for(&self, key: &str) -> Result<String, Error> {
        if self.objects.lock().await.contains_key(key) {
            Ok(format!("memory://{key}"))
        } else {
            Err(Error::NotFound(key.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_memory() {
        let uploader = InMemoryUploader::default();
        uploader
            .put("forms/1.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let url = uploader.url_for("forms/1.png").await.unwrap();
        assert_eq!(url, "memory://forms/1.png");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let uploader = InMemoryUploader::default();
        assert!(matches!(
            uploader.url_for("missing").await,
            Err(Error::NotFound(_))
        ));
    }
}
