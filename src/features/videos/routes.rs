use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::features::videos::handlers::{
    archive_video, delete_video, download_video, get_temporary_access_uri, get_video_metadata,
    list_videos, overwrite_video, update_video_metadata, upload_video,
};
use crate::features::videos::services::VideoService;

/// Create routes for the videos feature
pub fn routes(video_service: Arc<VideoService>, max_body_size: usize) -> Router {
    Router::new()
        .route("/api/storage/upload/{blobname}", post(upload_video))
        .route("/api/storage/list", get(list_videos))
        .route("/api/storage/download/{blobname}", get(download_video))
        .route(
            "/api/storage/metadata/{blobname}",
            get(get_video_metadata).post(update_video_metadata),
        )
        .route("/api/storage/overwrite/{blobname}", put(overwrite_video))
        .route("/api/storage/delete/{blobname}", delete(delete_video))
        .route(
            "/api/storage/sas-uri/{blobname}",
            get(get_temporary_access_uri),
        )
        .route("/api/storage/archive/{blobname}", post(archive_video))
        // Video payloads exceed axum's 2MB default
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(video_service)
}
