//! Configuration module for Tolk.
//!
//! Handles loading and managing application settings and the analysis
//! prompt template.

mod prompts;
mod settings;

pub use prompts::build_analysis_prompt;
pub use settings::{GeneralSettings, Settings, SynthesisSettings, TranscriptionSettings};
