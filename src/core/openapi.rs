use utoipa::{Modify, OpenApi};

use crate::features::videos::{dtos as videos_dtos, handlers as videos_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Videos
        videos_handlers::upload_video,
        videos_handlers::list_videos,
        videos_handlers::download_video,
        videos_handlers::get_video_metadata,
        videos_handlers::update_video_metadata,
        videos_handlers::overwrite_video,
        videos_handlers::delete_video,
        videos_handlers::get_temporary_access_uri,
        videos_handlers::archive_video,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Videos
            videos_dtos::VideoResponseDto,
            videos_dtos::VideoMetadataDto,
            videos_dtos::OverwriteResponseDto,
            videos_dtos::TemporaryAccessDto,
            videos_dtos::DeleteVideoResponseDto,
            videos_dtos::ArchiveResponseDto,
            ApiResponse<videos_dtos::VideoResponseDto>,
            ApiResponse<Vec<videos_dtos::VideoResponseDto>>,
            ApiResponse<videos_dtos::VideoMetadataDto>,
            ApiResponse<videos_dtos::OverwriteResponseDto>,
            ApiResponse<videos_dtos::TemporaryAccessDto>,
            ApiResponse<videos_dtos::DeleteVideoResponseDto>,
            ApiResponse<videos_dtos::ArchiveResponseDto>,
        )
    ),
    tags(
        (name = "videos", description = "Learning video storage (upload, metadata, temporary access, archive)"),
    ),
    info(
        title = "Video Blob API",
        version = "0.1.0",
        description = "Learning video storage over Azure Blob Storage",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_video_routes() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/api/storage/upload/{blobname}",
            "/api/storage/list",
            "/api/storage/metadata/{blobname}",
            "/api/storage/archive/{blobname}",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_swagger_info_modifier() {
        let mut openapi = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Videos".to_string(),
            version: "2.0.0".to_string(),
            description: "Custom".to_string(),
        }
        .modify(&mut openapi);
        assert_eq!(openapi.info.title, "Videos");
        assert_eq!(openapi.info.version, "2.0.0");
    }
}
