//! Generation and question endpoints.

use super::{ApiError, ApiResult, AppState, Pagination, ValidatedJson};
use crate::error::LekseError;
use crate::store::{Generation, Question, QuestionUpdate};
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
pub(crate) struct GenerateRequest {
    video_ids: Vec<String>,
    question_count: Option<i64>,
}

/// POST /api/questions/generate
pub(crate) async fn generate(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<GenerateRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.video_ids.is_empty() {
        return Err(ApiError(LekseError::Validation(
            "No video ids provided".to_string(),
        )));
    }

    let count = request
        .question_count
        .unwrap_or(state.pipeline.settings().questions.default_count as i64);

    let batch = state.pipeline.generate_batch(&request.video_ids, count).await?;
    Ok(Json(batch))
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationListResponse {
    generations: Vec<Generation>,
    total: u64,
}

/// GET /api/generations
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<GenerationListResponse>> {
    let (skip, limit) = pagination.checked()?;
    let (generations, total) = state.pipeline.store().list_generations(skip, limit)?;
    Ok(Json(GenerationListResponse { generations, total }))
}

/// A generation with its questions in display order.
#[derive(Debug, Serialize)]
pub(crate) struct GenerationDetailResponse {
    id: i64,
    video_ids: Vec<String>,
    question_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    questions: Vec<Question>,
}

impl GenerationDetailResponse {
    fn new(generation: Generation, questions: Vec<Question>) -> Self {
        Self {
            id: generation.id,
            video_ids: generation.video_ids,
            question_count: generation.question_count,
            created_at: generation.created_at,
            updated_at: generation.updated_at,
            questions,
        }
    }
}

/// GET /api/generations/{id}
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<GenerationDetailResponse>> {
    let store = state.pipeline.store();
    let generation = store
        .get_generation(id)?
        .ok_or_else(|| LekseError::NotFound(format!("Generation {} not found", id)))?;
    let questions = store.questions_for_generation(id)?;
    Ok(Json(GenerationDetailResponse::new(generation, questions)))
}

/// DELETE /api/generations/{id}
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.pipeline.store().delete_generation(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/generations/{id}/questions/{question_id}
pub(crate) async fn update_question(
    State(state): State<Arc<AppState>>,
    Path((generation_id, question_id)): Path<(i64, i64)>,
    ValidatedJson(update): ValidatedJson<QuestionUpdate>,
) -> ApiResult<Json<Question>> {
    let question = state
        .pipeline
        .store()
        .update_question(generation_id, question_id, &update)?;
    Ok(Json(question))
}

/// DELETE /api/generations/{id}/questions/{question_id}
pub(crate) async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path((generation_id, question_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    state.pipeline.store().delete_question(generation_id, question_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReorderRequest {
    question_ids: Vec<i64>,
}

/// PUT /api/generations/{id}/questions/reorder
pub(crate) async fn reorder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<ReorderRequest>,
) -> ApiResult<Json<GenerationDetailResponse>> {
    let store = state.pipeline.store();
    let questions = store.reorder_questions(id, &request.question_ids)?;
    let generation = store
        .get_generation(id)?
        .ok_or_else(|| LekseError::NotFound(format!("Generation {} not found", id)))?;
    Ok(Json(GenerationDetailResponse::new(generation, questions)))
}
