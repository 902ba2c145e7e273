use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::core::error::AppError;
use crate::core::extractor::{AppQuery, IfMatch};
use crate::features::videos::dtos::{
    ArchiveResponseDto, BlobNameDto, DeleteVideoResponseDto, ListVideosQuery,
    OverwriteResponseDto, TemporaryAccessDto, VideoMetadataDto, VideoMetadataQuery,
    VideoResponseDto,
};
use crate::features::videos::services::{UploadOutcome, VideoService};
use crate::shared::types::{ApiResponse, Meta};

/// Upload a video
///
/// The request body is the raw video content. An existing blob with the same
/// name is left untouched and the request succeeds with no data.
#[utoipa::path(
    post,
    path = "/api/storage/upload/{blobname}",
    tag = "videos",
    params(
        ("blobname" = String, Path, description = "Blob name"),
        VideoMetadataQuery
    ),
    request_body(
        content = String,
        content_type = "application/octet-stream",
        description = "Raw video bytes; empty to upload the configured source file",
    ),
    responses(
        (status = 201, description = "Video uploaded", body = ApiResponse<VideoResponseDto>),
        (status = 200, description = "Video already exists, nothing uploaded"),
        (status = 400, description = "Invalid name, metadata or empty payload"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Blob storage error")
    )
)]
pub async fn upload_video(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
    AppQuery(query): AppQuery<VideoMetadataQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<VideoResponseDto>>), AppError> {
    let name = BlobNameDto::parse(blobname)?;
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = service
        .upload(&name, body.to_vec(), &query.title, &query.description)
        .await?;

    Ok(match outcome {
        UploadOutcome::Created(video) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(Some(video), None, None)),
        ),
        UploadOutcome::AlreadyExists => (
            StatusCode::OK,
            Json(ApiResponse::success(
                None,
                Some(format!("Video '{}' already exists", name)),
                None,
            )),
        ),
    })
}

/// List videos, optionally filtered by name prefix
#[utoipa::path(
    get,
    path = "/api/storage/list",
    tag = "videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "Videos in the container", body = ApiResponse<Vec<VideoResponseDto>>),
        (status = 400, description = "Invalid prefix"),
        (status = 502, description = "Blob storage error")
    )
)]
pub async fn list_videos(
    State(service): State<Arc<VideoService>>,
    AppQuery(query): AppQuery<ListVideosQuery>,
) -> Result<Json<ApiResponse<Vec<VideoResponseDto>>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let videos = service.list(query.prefix.as_deref()).await?;
    let total = videos.len();

    Ok(Json(ApiResponse::success(
        Some(videos),
        None,
        Some(Meta::with_total(total)),
    )))
}

/// Download the content of a video
#[utoipa::path(
    get,
    path = "/api/storage/download/{blobname}",
    tag = "videos",
    params(("blobname" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Video content", content_type = "application/octet-stream", body = String),
        (status = 404, description = "Video not found"),
        (status = 502, description = "Blob storage error")
    )
)]
pub async fn download_video(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
) -> Result<Response, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    let content = service.download(&name).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

/// Get the title, description and etag of a video
#[utoipa::path(
    get,
    path = "/api/storage/metadata/{blobname}",
    tag = "videos",
    params(("blobname" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Video metadata", body = ApiResponse<VideoMetadataDto>),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_video_metadata(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
) -> Result<Json<ApiResponse<VideoMetadataDto>>, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    let metadata = service.get_metadata(&name).await?;

    Ok(Json(ApiResponse::success(Some(metadata), None, None)))
}

/// Replace the title and description of a video
///
/// Send the etag from a previous read as `If-Match` to fail with 409 when the
/// video changed in the meantime.
#[utoipa::path(
    post,
    path = "/api/storage/metadata/{blobname}",
    tag = "videos",
    params(
        ("blobname" = String, Path, description = "Blob name"),
        ("If-Match" = Option<String>, Header, description = "Expected etag"),
        VideoMetadataQuery
    ),
    responses(
        (status = 200, description = "Metadata updated", body = ApiResponse<VideoMetadataDto>),
        (status = 400, description = "Invalid metadata"),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Etag mismatch")
    )
)]
pub async fn update_video_metadata(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
    IfMatch(if_match): IfMatch,
    AppQuery(query): AppQuery<VideoMetadataQuery>,
) -> Result<Json<ApiResponse<VideoMetadataDto>>, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let metadata = service
        .update_metadata(&name, &query.title, &query.description, if_match)
        .await?;

    Ok(Json(ApiResponse::success(
        Some(metadata),
        Some("Metadata updated successfully".to_string()),
        None,
    )))
}

/// Replace the content of an existing video
#[utoipa::path(
    put,
    path = "/api/storage/overwrite/{blobname}",
    tag = "videos",
    params(
        ("blobname" = String, Path, description = "Blob name"),
        ("If-Match" = Option<String>, Header, description = "Expected etag")
    ),
    request_body(
        content = String,
        content_type = "application/octet-stream",
        description = "Raw video bytes",
    ),
    responses(
        (status = 200, description = "Video overwritten", body = ApiResponse<OverwriteResponseDto>),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Etag mismatch"),
        (status = 413, description = "Payload too large")
    )
)]
pub async fn overwrite_video(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
    IfMatch(if_match): IfMatch,
    body: Bytes,
) -> Result<Json<ApiResponse<OverwriteResponseDto>>, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    let response = service.overwrite(&name, body.to_vec(), if_match).await?;

    Ok(Json(ApiResponse::success(
        Some(response),
        Some("Video overwritten successfully".to_string()),
        None,
    )))
}

/// Delete a video
#[utoipa::path(
    delete,
    path = "/api/storage/delete/{blobname}",
    tag = "videos",
    params(
        ("blobname" = String, Path, description = "Blob name"),
        ("If-Match" = Option<String>, Header, description = "Expected etag")
    ),
    responses(
        (status = 200, description = "Video deleted", body = ApiResponse<DeleteVideoResponseDto>),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Etag mismatch")
    )
)]
pub async fn delete_video(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
    IfMatch(if_match): IfMatch,
) -> Result<Json<ApiResponse<DeleteVideoResponseDto>>, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    service.delete(&name, if_match).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteVideoResponseDto { deleted: true }),
        Some("Video deleted successfully".to_string()),
        None,
    )))
}

/// Get a read-only URL for a video valid for the configured window
#[utoipa::path(
    get,
    path = "/api/storage/sas-uri/{blobname}",
    tag = "videos",
    params(("blobname" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Temporary read URL", body = ApiResponse<TemporaryAccessDto>),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_temporary_access_uri(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
) -> Result<Json<ApiResponse<TemporaryAccessDto>>, AppError> {
    let name = BlobNameDto::parse(blobname)?;
    let access = service.temporary_access(&name).await?;

    Ok(Json(ApiResponse::success(Some(access), None, None)))
}

/// Copy a video into the archive container
///
/// The source video is kept. The copy may still be in progress when the
/// response is sent.
#[utoipa::path(
    post,
    path = "/api/storage/archive/{blobname}",
    tag = "videos",
    params(("blobname" = String, Path, description = "Blob name")),
    responses(
        (status = 202, description = "Archive copy started", body = ApiResponse<ArchiveResponseDto>),
        (status = 404, description = "Video not found"),
        (status = 502, description = "Blob storage error")
    )
)]
pub async fn archive_video(
    State(service): State<Arc<VideoService>>,
    Path(blobname): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<ArchiveResponseDto>>), AppError> {
    let name = BlobNameDto::parse(blobname)?;
    let response = service.archive(&name).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(response),
            Some("Archive copy started".to_string()),
            None,
        )),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};
    use serde_json::Value;

    use crate::core::config::StorageConfig;
    use crate::shared::test_helpers::video_test_server;

    #[tokio::test]
    async fn test_upload_then_list() {
        let (server, _) = video_test_server(StorageConfig::default());

        let response = server
            .post("/api/storage/upload/lecture1")
            .add_query_param("title", "Intro")
            .add_query_param("description", "")
            .bytes(b"lecture-bytes".to_vec().into())
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "lecture1");
        assert_eq!(body["data"]["title"], "Intro");

        let response = server.get("/api/storage/list").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["name"], "lecture1");
        assert_eq!(body["data"][0]["title"], "Intro");
        assert_eq!(body["data"][0]["description"], "");
    }

    #[tokio::test]
    async fn test_second_upload_is_a_no_op() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .bytes(b"v1".to_vec().into())
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/storage/upload/lecture1")
            .bytes(b"v2".to_vec().into())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["data"].is_null());

        let download = server.get("/api/storage/download/lecture1").await;
        assert_eq!(download.as_bytes().as_ref(), b"v1");
    }

    #[tokio::test]
    async fn test_empty_upload_without_source_is_bad_request() {
        let (server, _) = video_test_server(StorageConfig::default());
        let response = server.post("/api/storage/upload/lecture1").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .bytes(b"lecture-bytes".to_vec().into())
            .await;

        let response = server.get("/api/storage/download/lecture1").await;
        response.assert_status_ok();
        assert_eq!(
            response.header(header::CONTENT_TYPE),
            "application/octet-stream"
        );
        assert!(response
            .header(header::CONTENT_DISPOSITION)
            .to_str()
            .unwrap()
            .starts_with("attachment"));
        assert_eq!(response.as_bytes().as_ref(), b"lecture-bytes");
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .get("/api/storage/download/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/api/storage/metadata/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/api/storage/delete/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/storage/archive/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/api/storage/sas-uri/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stale_if_match_conflicts() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .bytes(b"v1".to_vec().into())
            .await;

        let metadata: Value = server.get("/api/storage/metadata/lecture1").await.json();
        let etag = metadata["data"]["etag"].as_str().unwrap().to_string();

        let response = server
            .post("/api/storage/metadata/lecture1")
            .add_query_param("title", "Ownership")
            .add_header(header::IF_MATCH, etag.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["title"], "Ownership");

        // The first etag is now stale
        let response = server
            .delete("/api/storage/delete/lecture1")
            .add_header(header::IF_MATCH, etag)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["success"], false);

        server
            .delete("/api/storage/delete/lecture1")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .add_query_param("title", "Intro")
            .bytes(b"v1".to_vec().into())
            .await;

        let response = server
            .put("/api/storage/overwrite/lecture1")
            .bytes(b"v2-longer".to_vec().into())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["size"], 9);

        let download = server.get("/api/storage/download/lecture1").await;
        assert_eq!(download.as_bytes().as_ref(), b"v2-longer");

        let metadata: Value = server.get("/api/storage/metadata/lecture1").await.json();
        assert_eq!(metadata["data"]["title"], "Intro");
    }

    #[tokio::test]
    async fn test_archive_keeps_source() {
        let (server, storage) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .bytes(b"lecture-bytes".to_vec().into())
            .await;

        server
            .post("/api/storage/archive/lecture1")
            .await
            .assert_status(StatusCode::ACCEPTED);

        assert_eq!(
            storage.content_of("videos-archive", "lecture1").await,
            Some(b"lecture-bytes".to_vec())
        );
        server
            .get("/api/storage/download/lecture1")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_sas_uri_response() {
        let (server, _) = video_test_server(StorageConfig::default());
        server
            .post("/api/storage/upload/lecture1")
            .bytes(b"v".to_vec().into())
            .await;

        let response = server.get("/api/storage/sas-uri/lecture1").await;
        response.assert_status_ok();
        let body: Value = response.json();
        let url = body["data"]["url"].as_str().unwrap();
        assert!(url.contains("/videos/lecture1?sv="));
        assert!(body["data"]["expires_at"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_input_is_bad_request() {
        let (server, _) = video_test_server(StorageConfig::default());

        server
            .post("/api/storage/upload/lecture.")
            .bytes(b"v".to_vec().into())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/storage/upload/lecture1")
            .add_query_param("title", "Café")
            .bytes(b"v".to_vec().into())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/api/storage/list")
            .add_query_param("prefix", "p".repeat(1025))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let (server, _) = video_test_server(StorageConfig {
            list_page_size: Some(1),
            ..StorageConfig::default()
        });
        for name in ["lec1", "lec2", "other"] {
            server
                .post(&format!("/api/storage/upload/{}", name))
                .bytes(b"v".to_vec().into())
                .await;
        }

        let body: Value = server
            .get("/api/storage/list")
            .add_query_param("prefix", "lec")
            .await
            .json();
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["data"][0]["name"], "lec1");
        assert_eq!(body["data"][1]["name"], "lec2");
    }
}
