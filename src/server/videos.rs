//! Video endpoints.

use super::{ApiError, ApiResult, AppState, Pagination, ValidatedJson};
use crate::error::LekseError;
use crate::store::Video;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadRequest {
    urls: Vec<String>,
}

/// POST /api/videos/download
pub(crate) async fn download(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DownloadRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.urls.is_empty() {
        return Err(ApiError(LekseError::Validation("No URLs provided".to_string())));
    }

    let batch = state.pipeline.download_batch(&request.urls).await;
    Ok(Json(batch))
}

/// GET /api/videos
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<Video>>> {
    let (skip, limit) = pagination.checked()?;
    let videos = state.pipeline.store().list_videos(skip, limit)?;
    Ok(Json(videos))
}

/// GET /api/videos/{video_id}
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Video>> {
    let video = state
        .pipeline
        .store()
        .get_video(&video_id)?
        .ok_or_else(|| LekseError::NotFound(format!("Video {} not found", video_id)))?;
    Ok(Json(video))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteQuery {
    #[serde(default)]
    cascade: bool,
}

/// DELETE /api/videos/{video_id}[?cascade=true]
///
/// Rows are the source of truth: they are deleted first, then the files
/// they referenced are removed best-effort. A file that cannot be deleted
/// is logged as an orphan, not rolled back.
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.pipeline.store().delete_video(&video_id, query.cascade)?;

    if let Some(audio_path) = &deleted.video.audio_path {
        remove_file_logged(audio_path);
    }
    for chunk_path in &deleted.chunk_paths {
        remove_file_logged(chunk_path);
    }
    if !deleted.chunk_paths.is_empty() {
        let chunk_dir = state.pipeline.settings().chunk_storage_path(&video_id);
        if let Err(e) = std::fs::remove_dir(&chunk_dir) {
            warn!("Orphan chunk directory {}: {}", chunk_dir.display(), e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

fn remove_file_logged(path: &str) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Orphan file {}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::test_server;
    use crate::store::{DownloadStatus, NewVideo};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_download_endpoint_happy_path() {
        let server = test_server();

        let response = server
            .router
            .oneshot(json_request(
                "POST",
                "/api/videos/download",
                serde_json::json!({ "urls": ["https://youtu.be/aaaaaaaaaaa"] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["successful"], 1);
        assert_eq!(body["results"][0]["status"], "success");
        assert_eq!(body["results"][0]["video_id"], "aaaaaaaaaaa");
    }

    #[tokio::test]
    async fn test_download_rejects_empty_urls() {
        let server = test_server();

        let response = server
            .router
            .oneshot(json_request(
                "POST",
                "/api/videos/download",
                serde_json::json!({ "urls": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_video_404() {
        let server = test_server();

        let response = server
            .router
            .oneshot(empty_request("GET", "/api/videos/missing00000"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_refused_then_cascade() {
        let server = test_server();
        server
            .store
            .insert_video(&NewVideo {
                video_id: "aaaaaaaaaaa".to_string(),
                title: "Video".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Completed,
            })
            .unwrap();
        let transcription = server
            .store
            .insert_transcription("aaaaaaaaaaa", "text", None, "completed")
            .unwrap();

        // Refused without cascade, with the dependent listed
        let response = server
            .router
            .clone()
            .oneshot(empty_request("DELETE", "/api/videos/aaaaaaaaaaa"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "dependency_violation");
        assert_eq!(body["dependent_resources"][0]["type"], "transcription");
        assert_eq!(body["dependent_resources"][0]["id"], transcription.id);

        // Cascade succeeds with 204
        let response = server
            .router
            .oneshot(empty_request("DELETE", "/api/videos/aaaaaaaaaaa?cascade=true"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(server.store.get_video("aaaaaaaaaaa").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_videos_with_pagination() {
        let server = test_server();
        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb"] {
            server
                .store
                .insert_video(&NewVideo {
                    video_id: id.to_string(),
                    title: format!("Video {}", id),
                    thumbnail_url: None,
                    audio_path: None,
                    download_status: DownloadStatus::Completed,
                })
                .unwrap();
        }

        let response = server
            .router
            .clone()
            .oneshot(empty_request("GET", "/api/videos?skip=0&limit=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // limit=0 is rejected
        let response = server
            .router
            .oneshot(empty_request("GET", "/api/videos?limit=0"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
