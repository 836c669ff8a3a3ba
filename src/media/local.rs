//! Local-disk media store. Files are served by the router under `/uploads`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{MediaError, MediaStore, StoredAsset, Upload};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_prefix: String,
    max_size: usize,
}

fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Asset ids are bare file names; anything that could escape the root is refused.
fn is_safe_asset_id(asset_id: &str) -> bool {
    !asset_id.is_empty()
        && !asset_id.contains("..")
        && !asset_id.contains('/')
        && !asset_id.contains('\\')
        && !asset_id.contains('\0')
}

impl LocalMediaStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        public_prefix: &str,
        max_size: usize,
    ) -> Result<Self, MediaError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            MediaError::Io(format!(
                "failed to create upload directory '{}': {}",
                root.display(),
                e
            ))
        })?;

        tracing::info!(path = %root.display(), "Media store initialized");

        Ok(Self {
            root,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            max_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, asset_id: &str) -> Option<PathBuf> {
        is_safe_asset_id(asset_id).then(|| self.root.join(asset_id))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, upload: Upload) -> Result<StoredAsset, MediaError> {
        if let Some(name) = upload.file_name.as_deref() {
            let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
            if name.contains('.') && !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                return Err(MediaError::Rejected(
                    "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.".to_string(),
                ));
            }
        }

        if upload.bytes.is_empty() {
            return Err(MediaError::Rejected("Empty file".to_string()));
        }

        if upload.bytes.len() > self.max_size {
            return Err(MediaError::Rejected(format!(
                "File too large. Maximum size is {} bytes.",
                self.max_size
            )));
        }

        let mime = detect_image_type(&upload.bytes).ok_or_else(|| {
            MediaError::Rejected("File content does not match an allowed image type.".to_string())
        })?;

        let asset_id = format!("{}.{}", Uuid::new_v4(), extension_for(mime));
        let path = self.root.join(&asset_id);

        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| MediaError::Io(format!("failed to write {}: {}", asset_id, e)))?;

        tracing::info!(asset_id = %asset_id, size = upload.bytes.len(), mime = %mime, "Image uploaded");

        Ok(StoredAsset {
            url: format!("{}/{}", self.public_prefix, asset_id),
            asset_id,
        })
    }

    async fn destroy(&self, asset_id: &str) -> Result<(), MediaError> {
        let path = self
            .path_of(asset_id)
            .ok_or_else(|| MediaError::Rejected(format!("invalid asset id {:?}", asset_id)))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(asset_id = %asset_id, "Image deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(asset_id = %asset_id, "Image already gone");
                Ok(())
            }
            Err(e) => Err(MediaError::Io(format!(
                "failed to delete {}: {}",
                asset_id, e
            ))),
        }
    }
}
