//! Data models for transcription.

use serde::{Deserialize, Serialize};

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// The persisted transcript line for this segment.
    pub fn format_line(&self) -> String {
        format!(
            "[{:.2}s -> {:.2}s] {}",
            self.start_seconds, self.end_seconds, self.text
        )
    }
}

/// A complete transcript: ordered segments plus the artifact's title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Sanitized title of the source media.
    pub title: String,
    /// Individual transcript segments in non-decreasing start order.
    pub segments: Vec<TranscriptSegment>,
    /// Total duration in seconds (end of the last segment).
    pub duration_seconds: f64,
}

impl Transcript {
    pub fn new(title: String, segments: Vec<TranscriptSegment>) -> Self {
        let duration_seconds = segments.last().map(|s| s.end_seconds).unwrap_or(0.0);

        Self {
            title,
            segments,
            duration_seconds,
        }
    }

}

/// Engine-reported metadata for a transcription.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionInfo {
    /// Detected language code (e.g. "en"), if reported.
    pub language: Option<String>,
    /// Detection confidence in [0, 1], if reported.
    pub language_probability: Option<f64>,
    /// Total audio duration in seconds, if the engine knows it.
    pub total_duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_fixed_point() {
        let segment = TranscriptSegment::new(0.0, 30.0, "hello there".to_string());
        assert_eq!(segment.format_line(), "[0.00s -> 30.00s] hello there");

        let segment = TranscriptSegment::new(75.125, 120.5, "tail".to_string());
        assert_eq!(segment.format_line(), "[75.12s -> 120.50s] tail");
    }

    #[test]
    fn test_transcript_duration_from_last_segment() {
        let transcript = Transcript::new(
            "Example Title".to_string(),
            vec![
                TranscriptSegment::new(0.0, 5.0, "first".to_string()),
                TranscriptSegment::new(5.0, 10.0, "second".to_string()),
            ],
        );

        assert_eq!(transcript.duration_seconds, 10.0);
    }

    #[test]
    fn test_empty_transcript() {
        let transcript = Transcript::new("Empty".to_string(), vec![]);
        assert_eq!(transcript.duration_seconds, 0.0);
        assert!(transcript.segments.is_empty());
    }
}
