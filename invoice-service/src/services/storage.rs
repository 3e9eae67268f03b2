use crate::extract::UploadedFile;
use crate::models::BrandingUploads;
use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: &[u8]) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
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

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let file_name = Path::new(key)
            .file_name()
            .filter(|name| name.to_str() == Some(key))
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid storage key")))?;
        Ok(self.base_path.join(file_name))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8]) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

fn extension_for(file: &UploadedFile) -> &'static str {
    let from_name = file
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match from_name.as_deref() {
        Some("png") => "png",
        Some("jpg") | Some("jpeg") => "jpg",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("svg") => "svg",
        _ => match file.content_type.as_deref() {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            Some("image/svg+xml") => "svg",
            _ => "bin",
        },
    }
}

/// Public URL for a stored asset.
pub fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/uploads/{}", base_url.trim_end_matches('/'), key)
}

/// Stored key of an asset URL this service produced, if it is one.
pub fn key_from_url<'a>(base_url: &str, url: &'a str) -> Option<&'a str> {
    let prefix = format!("{}/uploads/", base_url.trim_end_matches('/'));
    url.strip_prefix(prefix.as_str())
        .filter(|key| !key.is_empty() && !key.contains('/'))
}

/// Persist the branding files of a request and return their public URLs.
///
/// Files with an empty body are ignored, as are file fields that are not a
/// branding slot.
pub async fn store_branding(
    storage: &dyn Storage,
    base_url: &str,
    files: &[UploadedFile],
) -> Result<BrandingUploads, AppError> {
    let mut uploads = BrandingUploads::default();

    for file in files.iter().filter(|f| !f.data.is_empty()) {
        let slot = match file.field.as_str() {
            "logo" => &mut uploads.logo,
            "stamp" => &mut uploads.stamp,
            "signature" => &mut uploads.signature,
            other => {
                tracing::debug!(field = %other, "Ignoring unexpected file field");
                continue;
            }
        };

        let key = format!("{}.{}", Uuid::new_v4(), extension_for(file));
        storage.upload(&key, &file.data).await?;
        tracing::info!(field = %file.field, key = %key, size = file.data.len(), "Stored upload");
        metrics::counter!("uploads_stored_total", "field" => file.field.clone()).increment(1);

        *slot = Some(public_url(base_url, &key));
    }

    Ok(uploads)
}
