//! Tolk - Media Transcription and Analysis
//!
//! A CLI tool that turns a remote media source into a timestamped
//! transcript and an AI-written markdown analysis document.
//!
//! The name "Tolk" comes from the Norwegian word for "interpreter."
//!
//! # Overview
//!
//! A run moves through three strictly sequential stages:
//!
//! 1. **Acquisition** - download the source's audio (or reuse a cached
//!    artifact keyed by the sanitized title)
//! 2. **Transcription** - stream timed segments out of a local speech
//!    engine into a persisted transcript file
//! 3. **Synthesis** - send the transcript to a remote generation API
//!    (with bounded, fixed-delay retries) and write the markdown result
//!
//! # Architecture
//!
//! - `config` - Configuration and the analysis prompt
//! - `source` - Media source abstraction (yt-dlp backed)
//! - `acquire` - Acquisition stage and artifact cache
//! - `transcription` - Speech engine seam, engine cache, streaming stage
//! - `synthesis` - Document generator seam and Anthropic client
//! - `progress` - Monotonic progress aggregation
//! - `retry` - Bounded fixed-backoff retry policy
//! - `pipeline` - Orchestration, run events, single-run enforcement
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tolk::config::Settings;
//! use tolk::pipeline::{Pipeline, PipelineEvent, PipelineRunner};
//! use tolk::source::YoutubeSource;
//! use tolk::synthesis::ClaudeGenerator;
//! use tolk::transcription::EngineCache;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let generator = Arc::new(ClaudeGenerator::new(
//!         &settings.api_key().expect("ANTHROPIC_API_KEY"),
//!         &settings.synthesis.model,
//!         settings.synthesis.max_tokens,
//!     )?);
//!
//!     let pipeline = Arc::new(Pipeline::new(
//!         settings,
//!         Arc::new(YoutubeSource::new()),
//!         Arc::new(EngineCache::whisper()),
//!         generator,
//!     ));
//!
//!     let runner = PipelineRunner::new();
//!     let mut handle = runner.try_start(pipeline, "https://youtu.be/...".into())?;
//!     while let Some(event) = handle.events.recv().await {
//!         if let PipelineEvent::Progress(p) = event {
//!             println!("{p}%");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod source;
pub mod synthesis;
pub mod transcription;

pub use error::{Result, TolkError};
