use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};
use crate::features::videos::dtos::{
    ArchiveResponseDto, OverwriteResponseDto, TemporaryAccessDto, VideoMetadataDto,
    VideoResponseDto,
};
use crate::modules::storage::{sas_expiry_from_now, BlobRef, VideoStorage};

/// Result of an upload request
#[derive(Debug)]
pub enum UploadOutcome {
    Created(VideoResponseDto),
    /// A blob with the same name is already stored and was left untouched
    AlreadyExists,
}

/// Service for video operations on top of a [`VideoStorage`] backend
pub struct VideoService {
    storage: Arc<dyn VideoStorage>,
    upload_source_path: Option<PathBuf>,
    archive_container: String,
    sas_expiry: Duration,
}

impl VideoService {
    pub fn new(storage: Arc<dyn VideoStorage>, config: &StorageConfig) -> Self {
        Self {
            storage,
            upload_source_path: config.upload_source_path.clone(),
            archive_container: config.archive_container.clone(),
            sas_expiry: Duration::from_secs(config.sas_expiry_secs),
        }
    }

    /// Upload a new video unless one with the same name exists
    ///
    /// An empty payload falls back to the configured upload source file.
    pub async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        title: &str,
        description: &str,
    ) -> Result<UploadOutcome> {
        if self.storage.exists(name).await? {
            debug!("Video '{}' already exists, skipping upload", name);
            return Ok(UploadOutcome::AlreadyExists);
        }

        let data = if data.is_empty() {
            self.read_upload_source().await?
        } else {
            data
        };

        let size = data.len();
        let blob = self.storage.upload(data, name, title, description).await?;
        info!("Video uploaded: name={}, size={}", name, size);

        Ok(UploadOutcome::Created(VideoResponseDto::from(&blob)))
    }

    async fn read_upload_source(&self) -> Result<Vec<u8>> {
        let path = self.upload_source_path.as_ref().ok_or_else(|| {
            AppError::BadRequest(
                "Request body is empty and no upload source file is configured".to_string(),
            )
        })?;

        let data = tokio::fs::read(path).await.map_err(|e| {
            warn!("Failed to read upload source {}: {}", path.display(), e);
            AppError::Internal(format!(
                "Failed to read upload source {}: {}",
                path.display(),
                e
            ))
        })?;
        if data.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Upload source {} is empty",
                path.display()
            )));
        }

        debug!("Using upload source {} ({} bytes)", path.display(), data.len());
        Ok(data)
    }

    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<VideoResponseDto>> {
        let blobs = self.storage.list(prefix).await?;
        Ok(blobs.iter().map(VideoResponseDto::from).collect())
    }

    /// Full content of a video
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let blob = self.storage.get_ref(name).await?;
        let mut content = Vec::new();
        self.storage.download(&blob, &mut content).await?;

        debug!("Video downloaded: name={}, size={}", name, content.len());
        Ok(content)
    }

    pub async fn get_metadata(&self, name: &str) -> Result<VideoMetadataDto> {
        let blob = self.live_ref(name, None).await?;
        Ok(Self::metadata_dto(self.storage.as_ref(), &blob))
    }

    pub async fn update_metadata(
        &self,
        name: &str,
        title: &str,
        description: &str,
        if_match: Option<String>,
    ) -> Result<VideoMetadataDto> {
        let mut blob = self.live_ref(name, if_match).await?;
        self.storage
            .update_metadata(&mut blob, title, description)
            .await?;

        info!("Video metadata updated: name={}", name);
        Ok(Self::metadata_dto(self.storage.as_ref(), &blob))
    }

    pub async fn overwrite(
        &self,
        name: &str,
        data: Vec<u8>,
        if_match: Option<String>,
    ) -> Result<OverwriteResponseDto> {
        let mut blob = self.live_ref(name, if_match).await?;
        let size = data.len() as u64;
        self.storage.overwrite(&mut blob, data).await?;

        info!("Video overwritten: name={}, size={}", name, size);
        Ok(OverwriteResponseDto {
            name: blob.name,
            etag: blob.etag,
            size,
        })
    }

    pub async fn delete(&self, name: &str, if_match: Option<String>) -> Result<()> {
        let blob = self.live_ref(name, if_match).await?;
        self.storage.delete(&blob).await?;

        info!("Video deleted: name={}", name);
        Ok(())
    }

    /// Read-only URL for an existing video
    pub async fn temporary_access(&self, name: &str) -> Result<TemporaryAccessDto> {
        let blob = self.live_ref(name, None).await?;
        let expires_at = sas_expiry_from_now(self.sas_expiry)?;
        let url = self.storage.uri_with_temporary_access(&blob)?;

        Ok(TemporaryAccessDto { url, expires_at })
    }

    /// Copy an existing video into the archive container
    pub async fn archive(&self, name: &str) -> Result<ArchiveResponseDto> {
        let blob = self.live_ref(name, None).await?;
        self.storage.archive(&blob).await?;

        info!(
            "Video archive started: name={}, container={}",
            name, self.archive_container
        );
        Ok(ArchiveResponseDto {
            name: blob.name,
            archive_container: self.archive_container.clone(),
        })
    }

    /// Reference with live attributes; a client etag replaces the live one
    async fn live_ref(&self, name: &str, if_match: Option<String>) -> Result<BlobRef> {
        let mut blob = self.storage.get_ref(name).await?;
        self.storage.reload_metadata(&mut blob).await?;
        if let Some(etag) = if_match {
            blob.etag = Some(etag);
        }
        Ok(blob)
    }

    fn metadata_dto(storage: &dyn VideoStorage, blob: &BlobRef) -> VideoMetadataDto {
        let (title, description) = storage.get_metadata(blob);
        VideoMetadataDto {
            title,
            description,
            etag: blob.etag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::InMemoryVideoStorage;
    use chrono::Utc;
    use std::io::Write;

    fn service(config: StorageConfig) -> VideoService {
        let storage = Arc::new(InMemoryVideoStorage::new(&config));
        VideoService::new(storage, &config)
    }

    #[tokio::test]
    async fn test_upload_skips_existing_blob() {
        let service = service(StorageConfig::default());

        let first = service.upload("lecture1", b"v1".to_vec(), "Intro", "").await.unwrap();
        assert!(matches!(first, UploadOutcome::Created(_)));

        let second = service.upload("lecture1", b"v2".to_vec(), "Other", "").await.unwrap();
        assert!(matches!(second, UploadOutcome::AlreadyExists));
        assert_eq!(service.download("lecture1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_empty_upload_without_source_is_rejected() {
        let service = service(StorageConfig::default());
        let err = service.upload("lecture1", Vec::new(), "", "").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_empty_upload_uses_source_file() {
        let path = std::env::temp_dir().join(format!("upload-source-{}.bin", uuid::Uuid::new_v4()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"fallback-video")
            .unwrap();

        let service = service(StorageConfig {
            upload_source_path: Some(path.clone()),
            ..StorageConfig::default()
        });
        service.upload("lecture1", Vec::new(), "", "").await.unwrap();
        assert_eq!(service.download("lecture1").await.unwrap(), b"fallback-video");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_client_etag_overrides_live_etag() {
        let service = service(StorageConfig::default());
        service.upload("lecture1", b"v1".to_vec(), "", "").await.unwrap();

        let err = service
            .delete("lecture1", Some("\"stale\"".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let live = service.get_metadata("lecture1").await.unwrap();
        service.delete("lecture1", live.etag).await.unwrap();
        assert!(service.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let service = service(StorageConfig::default());
        assert!(matches!(
            service.get_metadata("ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.temporary_access("ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.archive("ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_temporary_access_expiry_window() {
        let service = service(StorageConfig {
            sas_expiry_secs: 3600,
            ..StorageConfig::default()
        });
        service.upload("lecture1", b"v".to_vec(), "", "").await.unwrap();

        let before = Utc::now();
        let access = service.temporary_access("lecture1").await.unwrap();
        assert!(access.url.contains("sp=r"));
        assert!(access.expires_at >= before + chrono::Duration::seconds(3599));
        assert!(access.expires_at <= Utc::now() + chrono::Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_internal_error() {
        let service = service(StorageConfig {
            sas_expiry_secs: 10_000_000_000_000,
            ..StorageConfig::default()
        });
        service.upload("lecture1", b"v".to_vec(), "", "").await.unwrap();

        let err = service.temporary_access("lecture1").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
