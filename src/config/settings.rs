//! Configuration settings for Tolk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub synthesis: SynthesisSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Working directory for audio, transcript, and markdown artifacts.
    pub work_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            work_dir: ".".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Speech engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Path to the whisper model file.
    pub model_path: String,
    /// Compute device ("cpu" or "cuda").
    pub device: String,
    /// Decoder beam size.
    pub beam_size: u32,
    /// Language hint for the engine.
    pub language: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model_path: "~/.tolk/models/ggml-base.en.bin".to_string(),
            device: "cpu".to_string(),
            beam_size: 5,
            language: "en".to_string(),
        }
    }
}

/// Document synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Model used for analysis generation.
    pub model: String,
    /// Maximum tokens in the generated document.
    pub max_tokens: u32,
    /// Total attempts for a transiently failing call.
    pub max_attempts: u32,
    /// Fixed delay between retry attempts, in seconds.
    pub retry_delay_seconds: u64,
    /// API key; falls back to ANTHROPIC_API_KEY when unset.
    pub api_key: Option<String>,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4000,
            max_attempts: 3,
            retry_delay_seconds: 5,
            api_key: None,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TolkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tolk")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded working directory path.
    pub fn work_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.work_dir)
    }

    /// Get the expanded model path.
    pub fn model_path(&self) -> PathBuf {
        Self::expand_path(&self.transcription.model_path)
    }

    /// Resolve the synthesis API key from config or environment.
    pub fn api_key(&self) -> Option<String> {
        self.synthesis
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}
