//! Pipeline orchestration.
//!
//! The `Pipeline` owns every component and drives the batch operations the
//! HTTP surface exposes: download, transcribe, generate questions. Batch
//! items run sequentially so one audio file and one model invocation are
//! in flight at a time, and results come back in input order with per-item
//! failure accounting.

mod download;
mod questions;
mod transcribe;

pub use download::{DownloadBatch, DownloadItemStatus, DownloadResult};
pub use questions::{GenerateBatch, GenerateItemStatus, GenerateResult};
pub use transcribe::{TranscribeBatch, TranscribeItemStatus, TranscribeResult};

use crate::audio::{Chunker, MediaFetcher, YtDlpFetcher};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, RemoteEmbedder};
use crate::error::Result;
use crate::questions::{LlmQuestionGenerator, QuestionProvider};
use crate::store::Store;
use crate::transcription::{create_provider, TranscriptionProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How long a single download may run before it is killed.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// The main orchestrator for the Lekse pipeline.
pub struct Pipeline {
    settings: Settings,
    store: Arc<Store>,
    fetcher: Arc<dyn MediaFetcher>,
    chunker: Chunker,
    transcriber: Arc<dyn TranscriptionProvider>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn QuestionProvider>,
}

impl Pipeline {
    /// Create a pipeline with the configured components.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Arc::new(Store::open(
            &settings.database_path(),
            settings.embedding.dimensions,
        )?);

        let fetcher = Arc::new(YtDlpFetcher::new(
            settings.audio_storage_path(),
            &settings.general.audio_format,
            DOWNLOAD_TIMEOUT,
        ));

        let chunker = Chunker::new(settings.chunking.clone(), &settings.storage_path());
        let transcriber = create_provider(&settings)?;
        let embedder = Arc::new(RemoteEmbedder::new(&settings.embedding)?);

        let prompts = Prompts::load(settings.questions.custom_prompt_dir.as_deref())?;
        let generator = Arc::new(LlmQuestionGenerator::new(&settings, prompts)?);

        Ok(Self {
            settings,
            store,
            fetcher,
            chunker,
            transcriber,
            embedder,
            generator,
        })
    }

    /// Create a pipeline with custom components (used by tests).
    pub fn with_components(
        settings: Settings,
        store: Arc<Store>,
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Arc<dyn TranscriptionProvider>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn QuestionProvider>,
    ) -> Self {
        let chunker = Chunker::new(settings.chunking.clone(), &settings.storage_path());
        Self {
            settings,
            store,
            fetcher,
            chunker,
            transcriber,
            embedder,
            generator,
        }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Get the question provider (for health checks).
    pub fn question_provider(&self) -> Arc<dyn QuestionProvider> {
        self.generator.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Run `op` over each item in order, one at a time.
///
/// Sequential on purpose: it bounds peak resource use to a single item and
/// keeps failure attribution unambiguous. Results preserve input order.
pub async fn run_batch<I, R, F, Fut>(items: impl IntoIterator<Item = I>, mut op: F) -> Vec<R>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = R>,
{
    let mut results = Vec::new();
    for item in items {
        results.push(op(item).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_batch_preserves_order() {
        let results = run_batch(vec![3u64, 1, 2], |n| async move {
            // Later items finishing "faster" must not reorder anything
            tokio::time::sleep(Duration::from_millis(n)).await;
            n * 10
        })
        .await;

        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let results: Vec<u32> = run_batch(Vec::<u32>::new(), |n| async move { n }).await;
        assert!(results.is_empty());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Stub components for pipeline and handler tests.

    use crate::audio::{FetchedMedia, MediaFetcher};
    use crate::embedding::Embedder;
    use crate::error::{LekseError, Result};
    use crate::questions::{GeneratedQuestion, QuestionProvider, TranscriptInput};
    use crate::transcription::TranscriptionProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Fetcher that "downloads" by creating a small file on disk.
    pub struct StubFetcher {
        pub audio_dir: PathBuf,
        /// URLs that fail with a download error.
        pub failing: Vec<String>,
    }

    #[async_trait]
    impl MediaFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedMedia> {
            if self.failing.iter().any(|u| u == url) {
                return Err(LekseError::Download("remote failure".into()));
            }
            let video_id = crate::audio::extract_video_id(url)
                .ok_or_else(|| LekseError::InvalidUrl(url.to_string()))?;

            std::fs::create_dir_all(&self.audio_dir)?;
            let audio_path = self.audio_dir.join(format!("{}.mp3", video_id));
            std::fs::write(&audio_path, b"fake audio bytes")?;

            Ok(FetchedMedia {
                video_id: video_id.clone(),
                title: format!("Video {}", video_id),
                thumbnail_url: None,
                audio_path,
            })
        }
    }

    /// Transcriber returning canned text, recording every path it sees.
    pub struct StubTranscriber {
        pub text: String,
        pub max_bytes: Option<u64>,
        pub calls: Mutex<Vec<PathBuf>>,
        /// Paths that fail permanently.
        pub failing_paths: Vec<String>,
    }

    impl StubTranscriber {
        pub fn returning(text: &str) -> Self {
            Self {
                text: text.to_string(),
                max_bytes: None,
                calls: Mutex::new(Vec::new()),
                failing_paths: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl TranscriptionProvider for StubTranscriber {
        async fn transcribe(&self, audio_path: &Path, _language: &str) -> Result<String> {
            self.calls.lock().unwrap().push(audio_path.to_path_buf());
            let path_str = audio_path.to_string_lossy();
            if self.failing_paths.iter().any(|p| path_str.contains(p.as_str())) {
                return Err(LekseError::Transcription("stub failure".into()));
            }
            Ok(self.text.clone())
        }

        fn max_file_bytes(&self) -> Option<u64> {
            self.max_bytes
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    /// Embedder returning a fixed unit vector, or failing on demand.
    pub struct StubEmbedder {
        pub dimensions: usize,
        pub fail: bool,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(LekseError::Embedding("stub embedding failure".into()));
            }
            let mut v = vec![0.0; self.dimensions];
            v[0] = 1.0;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    /// Question provider with a canned per-video distribution.
    pub struct StubGenerator {
        /// video id -> number of questions to emit for it.
        pub per_video: HashMap<String, u32>,
        pub unavailable: bool,
    }

    #[async_trait]
    impl QuestionProvider for StubGenerator {
        async fn generate(
            &self,
            transcripts: &[TranscriptInput],
            count: u32,
        ) -> Result<Vec<GeneratedQuestion>> {
            if self.unavailable {
                return Err(LekseError::LlmUnavailable("backend down".into()));
            }
            let mut questions = Vec::new();
            for t in transcripts {
                let n = self.per_video.get(&t.video_id).copied().unwrap_or(0);
                for i in 0..n {
                    questions.push(GeneratedQuestion {
                        question_text: format!("Question {} about {}?", i, t.video_id),
                        answer: Some("An answer.".to_string()),
                        context: None,
                        difficulty: None,
                        question_type: None,
                        video_id: t.video_id.clone(),
                    });
                }
            }
            questions.truncate(count as usize);
            Ok(questions)
        }

        async fn check_health(&self) -> bool {
            !self.unavailable
        }
    }
}
