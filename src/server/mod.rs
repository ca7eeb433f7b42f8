//! HTTP API server.
//!
//! All endpoints are mounted under `/api`. Batch endpoints return 200 with
//! per-item statuses in the body; single-resource operations map failures
//! to HTTP statuses through `ApiError`.

mod error;
mod generations;
mod transcriptions;
mod videos;

pub use error::{ApiError, ApiResult};

use crate::config::Settings;
use crate::error::{LekseError, Result};
use crate::pipeline::Pipeline;
use axum::{
    extract::{FromRequest, State},
    http::HeaderValue,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
}

/// Build the full router for the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.pipeline.settings());

    let api = Router::new()
        .route("/health", get(health))
        .route("/videos/download", post(videos::download))
        .route("/videos/transcribe", post(transcriptions::transcribe))
        .route("/videos", get(videos::list))
        .route("/videos/{video_id}", get(videos::get).delete(videos::delete))
        .route("/transcriptions/transcribe", post(transcriptions::transcribe))
        .route("/transcriptions", get(transcriptions::list))
        .route(
            "/transcriptions/video/{video_id}",
            get(transcriptions::for_video),
        )
        .route(
            "/transcriptions/{id}",
            get(transcriptions::get).delete(transcriptions::delete),
        )
        .route("/questions/generate", post(generations::generate))
        .route("/generations", get(generations::list))
        .route(
            "/generations/{id}",
            get(generations::get).delete(generations::delete),
        )
        .route(
            "/generations/{id}/questions/reorder",
            put(generations::reorder),
        )
        .route(
            "/generations/{id}/questions/{question_id}",
            put(generations::update_question).delete(generations::delete_question),
        );

    Router::new().nest("/api", api).layer(cors).with_state(state)
}

/// Run the HTTP API server until it is shut down.
pub async fn run(host: &str, port: u16, settings: Settings) -> Result<()> {
    let pipeline = Pipeline::new(settings)?;
    pipeline.store().health_check()?;

    let state = Arc::new(AppState { pipeline });
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LekseError::Config(format!("Cannot bind {}: {}", addr, e)))?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = &settings.server.cors_origins;
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state.pipeline.store().health_check()?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Json extractor whose rejections are 400 validation errors.
///
/// Axum's stock `Json` answers malformed bodies and out-of-enum values
/// with 422; the API contract wants every input-shape problem as a 400
/// before component work starts.
pub(crate) struct ValidatedJson<T>(pub T);

impl<S, T> axum::extract::FromRequest<S> for ValidatedJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError(LekseError::Validation(rejection.body_text())))?;
        Ok(ValidatedJson(value))
    }
}

/// Standard skip/limit query parameters.
#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub(crate) fn default_limit() -> u32 {
    100
}

impl Pagination {
    /// Validate and cap the page size.
    pub fn checked(&self) -> std::result::Result<(u32, u32), ApiError> {
        if self.limit < 1 {
            return Err(ApiError(LekseError::Validation(
                "Limit parameter must be positive".to_string(),
            )));
        }
        Ok((self.skip, self.limit.min(1000)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A router wired with an in-memory store and stub components.

    use super::*;
    use crate::pipeline::test_support::*;
    use crate::questions::QuestionProvider;
    use crate::store::Store;
    use std::collections::HashMap;

    pub struct TestServer {
        pub router: Router,
        pub store: Arc<Store>,
        pub dir: tempfile::TempDir,
    }

    pub fn test_server() -> TestServer {
        test_server_with(|_| {})
    }

    pub fn test_server_with(configure: impl FnOnce(&mut TestConfig)) -> TestServer {
        let mut config = TestConfig::default();
        configure(&mut config);

        let dir = tempfile::tempdir().unwrap();
        let mut settings = crate::config::Settings::default();
        settings.general.storage_path = dir.path().to_string_lossy().to_string();
        settings.embedding.dimensions = 4;

        let store = Arc::new(Store::in_memory(4).unwrap());
        let fetcher = Arc::new(StubFetcher {
            audio_dir: dir.path().join("audio"),
            failing: config.failing_urls,
        });
        let transcriber = Arc::new(StubTranscriber::returning(&config.transcript_text));
        let embedder = Arc::new(StubEmbedder {
            dimensions: 4,
            fail: false,
        });
        let generator: Arc<dyn QuestionProvider> = Arc::new(StubGenerator {
            per_video: config.questions_per_video,
            unavailable: config.llm_unavailable,
        });

        let pipeline = Pipeline::with_components(
            settings,
            store.clone(),
            fetcher,
            transcriber,
            embedder,
            generator,
        );
        let state = Arc::new(AppState { pipeline });

        TestServer {
            router: build_router(state),
            store,
            dir,
        }
    }

    pub struct TestConfig {
        pub failing_urls: Vec<String>,
        pub transcript_text: String,
        pub questions_per_video: HashMap<String, u32>,
        pub llm_unavailable: bool,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                failing_urls: Vec::new(),
                transcript_text: "a lecture transcript".to_string(),
                questions_per_video: HashMap::new(),
                llm_unavailable: false,
            }
        }
    }
}
