//! Transcription module for Tolk.
//!
//! Turns a local audio artifact into a persisted, timestamped transcript
//! by consuming an external speech engine's lazy segment sequence.

mod models;
mod stage;
mod whisper;

pub use models::{Transcript, TranscriptSegment, TranscriptionInfo};
pub use stage::{transcribe_to_file, SegmentUpdate};
pub use whisper::WhisperEngine;

use crate::error::{Result, TolkError};
use futures::Stream;
use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Lazy, finite, non-restartable sequence of timed segments.
pub type SegmentStream = Pin<Box<dyn Stream<Item = Result<TranscriptSegment>> + Send>>;

/// Trait for speech-to-text engines.
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Start transcribing an audio file.
    ///
    /// Returns the segment stream together with whatever metadata the
    /// engine reports up front.
    async fn transcribe(&self, audio_path: &Path) -> Result<(SegmentStream, TranscriptionInfo)>;
}

/// Device and model selection for engine construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// Path to the model file.
    pub model_path: String,
    /// Compute device ("cpu" or "cuda").
    pub device: String,
    /// Decoder beam size.
    pub beam_size: u32,
    /// Language hint passed to the engine.
    pub language: String,
}

/// Cache of loaded engines keyed by (model_path, device).
///
/// Loading a model is expensive; the cache is owned by the caller and
/// passed into the pipeline explicitly rather than living in process-wide
/// state.
pub struct EngineCache {
    factory: Box<dyn Fn(&EngineConfig) -> Result<Arc<dyn SpeechEngine>> + Send + Sync>,
    engines: Mutex<HashMap<(String, String), Arc<dyn SpeechEngine>>>,
}

impl EngineCache {
    /// Create a cache with a custom engine factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&EngineConfig) -> Result<Arc<dyn SpeechEngine>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Cache that loads whisper engines.
    pub fn whisper() -> Self {
        Self::new(|config| {
            let engine = WhisperEngine::load(config)?;
            Ok(Arc::new(engine) as Arc<dyn SpeechEngine>)
        })
    }

    /// Get or load the engine for `config`.
    pub fn get(&self, config: &EngineConfig) -> Result<Arc<dyn SpeechEngine>> {
        let key = (config.model_path.clone(), config.device.clone());

        let mut engines = self
            .engines
            .lock()
            .map_err(|_| TolkError::ModelLoad("engine cache poisoned".into()))?;

        if let Some(engine) = engines.get(&key) {
            return Ok(engine.clone());
        }

        let engine = (self.factory)(config)?;
        engines.insert(key, engine.clone());
        Ok(engine)
    }
}
