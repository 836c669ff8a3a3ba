//! Image hosting collaborator.
//!
//! Posts and accounts keep two fields per image: the public URL and the
//! asset id needed to destroy it later.

pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::error::AppError;

pub use local::LocalMediaStore;

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Where an uploaded asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub asset_id: String,
}

#[derive(Debug, Error)]
pub enum MediaError {
    /// The client sent something that is not an acceptable image.
    #[error("{0}")]
    Rejected(String),

    #[error("media store failure: {0}")]
    Io(String),
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Rejected(msg) => AppError::Validation(msg),
            MediaError::Io(msg) => AppError::Storage(msg),
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, upload: Upload) -> Result<StoredAsset, MediaError>;

    /// Destroying an asset that no longer exists succeeds.
    async fn destroy(&self, asset_id: &str) -> Result<(), MediaError>;
}

/// Destroy an asset whose loss is not worth failing the request over.
/// Failures leave an orphaned asset behind and are only logged.
pub async fn destroy_best_effort(media: &dyn MediaStore, asset_id: &str) {
    if let Err(e) = media.destroy(asset_id).await {
        tracing::warn!(asset_id = %asset_id, error = %e, "failed to destroy media asset, leaving it orphaned");
    }
}
