//! Error-to-HTTP mapping for the REST surface.

use crate::error::LekseError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Wrapper turning `LekseError` into an HTTP response.
///
/// Batch endpoints catch component failures in-band; anything surfacing
/// here is a whole-request failure.
pub struct ApiError(pub LekseError);

impl<E> From<E> for ApiError
where
    E: Into<LekseError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            LekseError::Validation(_) | LekseError::InvalidUrl(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            LekseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LekseError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE"),
            LekseError::DependencyViolation { message, resources } => {
                // Dedicated envelope: the listing is what a UI needs to
                // build its confirmation dialog
                let body = json!({
                    "error": "dependency_violation",
                    "message": message,
                    "dependent_resources": resources,
                });
                tracing::warn!(status = 409, "Request refused: {}", message);
                return (StatusCode::CONFLICT, Json(body)).into_response();
            }
            LekseError::LlmUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "LLM_UNAVAILABLE"),
            LekseError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            LekseError::Download(_) => (StatusCode::BAD_GATEWAY, "DOWNLOAD_FAILED"),
            LekseError::Transcription(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TRANSCRIPTION_FAILED"),
            LekseError::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EMBEDDING_FAILED"),
            LekseError::Chunking(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CHUNKING_FAILED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.0.to_string();
        tracing::error!(
            error_code = error_code,
            status = %status,
            "Request error: {}",
            message
        );

        let body = json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Shorthand for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LekseError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (LekseError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LekseError::Duplicate("x".into()), StatusCode::CONFLICT),
            (
                LekseError::LlmUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (LekseError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
        ];

        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_dependency_violation_status() {
        let error = LekseError::DependencyViolation {
            message: "video has dependents".into(),
            resources: vec![crate::error::DependentResource::new("transcription", 7)],
        };
        let response = ApiError(error).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
