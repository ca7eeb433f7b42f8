//! Transcription endpoints.

use super::{ApiError, ApiResult, AppState, Pagination, ValidatedJson};
use crate::error::LekseError;
use crate::store::Transcription;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct TranscribeRequest {
    video_ids: Vec<String>,
}

/// Transcription row as returned over HTTP. The raw vector stays out of
/// responses; only its presence is reported.
#[derive(Debug, Serialize)]
pub(crate) struct TranscriptionResponse {
    id: i64,
    video_id: String,
    transcription_text: String,
    status: String,
    has_embedding: bool,
    created_at: DateTime<Utc>,
}

impl From<Transcription> for TranscriptionResponse {
    fn from(t: Transcription) -> Self {
        Self {
            id: t.id,
            video_id: t.video_id.clone(),
            transcription_text: t.transcription_text.clone(),
            status: t.status.clone(),
            has_embedding: t.has_embedding(),
            created_at: t.created_at,
        }
    }
}

/// POST /api/videos/transcribe (alias: POST /api/transcriptions/transcribe)
pub(crate) async fn transcribe(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<TranscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.video_ids.is_empty() {
        return Err(ApiError(LekseError::Validation(
            "No video ids provided".to_string(),
        )));
    }

    let batch = state.pipeline.transcribe_batch(&request.video_ids).await;
    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    skip: u32,
    #[serde(default = "super::default_limit")]
    limit: u32,
    video_id: Option<String>,
}

/// GET /api/transcriptions
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TranscriptionResponse>>> {
    let pagination = Pagination {
        skip: query.skip,
        limit: query.limit,
    };
    let (skip, limit) = pagination.checked()?;
    let rows = state
        .pipeline
        .store()
        .list_transcriptions(skip, limit, query.video_id.as_deref())?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /api/transcriptions/{id}
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TranscriptionResponse>> {
    let row = state
        .pipeline
        .store()
        .get_transcription(id)?
        .ok_or_else(|| LekseError::NotFound(format!("Transcription {} not found", id)))?;
    Ok(Json(row.into()))
}

/// GET /api/transcriptions/video/{video_id}
pub(crate) async fn for_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Vec<TranscriptionResponse>>> {
    let store = state.pipeline.store();
    if store.get_video(&video_id)?.is_none() {
        return Err(ApiError(LekseError::NotFound(format!(
            "Video {} not found",
            video_id
        ))));
    }

    let rows = store.transcriptions_for_video(&video_id)?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// DELETE /api/transcriptions/{id}
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.pipeline.store().delete_transcription(id)?;
    Ok(StatusCode::NO_CONTENT)
}
