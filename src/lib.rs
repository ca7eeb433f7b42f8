//! Lekse - YouTube Lecture Transcription and Question Generation
//!
//! A self-hosted service that ingests YouTube videos, transcribes their
//! audio, and generates educational questions grounded in the transcribed
//! text.
//!
//! The name "Lekse" comes from the Norwegian word for "lesson."
//!
//! # Overview
//!
//! Lekse allows you to:
//! - Download YouTube videos as audio files with embedded metadata
//! - Transcribe audio using a local whisper CLI or a remote API
//! - Store transcriptions with embedding vectors for future search
//! - Generate educational questions from transcriptions via an LLM backend
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `store` - Durable persistence for videos, chunks, transcriptions,
//!   generations, and questions
//! - `audio` - Video acquisition (yt-dlp) and silence-based audio chunking
//!   (FFmpeg)
//! - `transcription` - Speech-to-text providers (local / remote)
//! - `embedding` - Embedding generation
//! - `questions` - LLM question generation and response parsing
//! - `pipeline` - Batch orchestration with per-item failure accounting
//! - `server` - The REST API surface
//!
//! # Example
//!
//! ```rust,no_run
//! use lekse::config::Settings;
//! use lekse::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let batch = pipeline
//!         .download_batch(&["https://youtu.be/dQw4w9WgXcQ".to_string()])
//!         .await;
//!     println!("{} downloaded, {} failed", batch.successful, batch.failed);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod questions;
pub mod retry;
pub mod server;
pub mod store;
pub mod transcription;

pub use error::{DependentResource, LekseError, Result};
