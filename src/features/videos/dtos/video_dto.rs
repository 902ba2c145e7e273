use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::core::error::AppError;
use crate::modules::storage::BlobRef;

/// Blob name taken from the request path
#[derive(Debug, Validate)]
pub struct BlobNameDto {
    #[validate(
        length(min = 1, max = 1024, message = "Blob name must be 1-1024 characters"),
        regex(
            path = "*crate::shared::validation::BLOB_NAME_REGEX",
            message = "Blob name must not contain path separators, '?', '#' or control characters and must not end with '.'"
        )
    )]
    pub name: String,
}

impl BlobNameDto {
    /// Validate a raw path segment and return it as an owned name
    pub fn parse(name: String) -> Result<String, AppError> {
        let dto = Self { name };
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(dto.name)
    }
}

/// Title and description query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VideoMetadataQuery {
    /// Video title, blank removes it
    #[serde(default)]
    #[validate(
        length(max = 1024, message = "Title must not exceed 1024 characters"),
        regex(
            path = "*crate::shared::validation::PRINTABLE_ASCII_REGEX",
            message = "Title must contain printable ASCII characters only"
        )
    )]
    #[param(example = "Intro")]
    pub title: String,

    /// Video description, blank removes it
    #[serde(default)]
    #[validate(
        length(max = 1024, message = "Description must not exceed 1024 characters"),
        regex(
            path = "*crate::shared::validation::PRINTABLE_ASCII_REGEX",
            message = "Description must contain printable ASCII characters only"
        )
    )]
    pub description: String,
}

/// Query parameters for listing videos
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListVideosQuery {
    /// Only return blobs whose name starts with this prefix
    #[validate(length(max = 1024, message = "Prefix must not exceed 1024 characters"))]
    #[param(example = "lec")]
    pub prefix: Option<String>,
}

/// A stored video
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoResponseDto {
    /// Blob name
    #[schema(example = "lecture1")]
    pub name: String,
    /// Canonical blob URI
    pub uri: String,
    #[schema(example = "Intro")]
    pub title: String,
    pub description: String,
}

impl From<&BlobRef> for VideoResponseDto {
    fn from(blob: &BlobRef) -> Self {
        Self {
            name: blob.name.clone(),
            uri: blob.uri.clone(),
            title: blob.title().to_string(),
            description: blob.description().to_string(),
        }
    }
}

/// Title, description and current etag of a video
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoMetadataDto {
    pub title: String,
    pub description: String,
    /// Send back as `If-Match` to guard the next mutation
    pub etag: Option<String>,
}

/// Result of replacing a video's content
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OverwriteResponseDto {
    pub name: String,
    pub etag: Option<String>,
    /// Number of bytes written
    pub size: u64,
}

/// Time-limited read URL for a video
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemporaryAccessDto {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteVideoResponseDto {
    pub deleted: bool,
}

/// Response DTO for archive requests
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveResponseDto {
    pub name: String,
    /// Container receiving the copy
    pub archive_container: String,
}
