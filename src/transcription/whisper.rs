//! Whisper speech engine driven through the whisper-cli binary.
//!
//! Spawns whisper.cpp's CLI and parses its timestamped output lines as
//! they appear, so segments reach the caller while the engine is still
//! working through the file.

use super::{EngineConfig, SegmentStream, SpeechEngine, TranscriptSegment, TranscriptionInfo};
use crate::error::{Result, TolkError};
use async_trait::async_trait;
use futures::stream;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, instrument};

/// Binary name for whisper.cpp's command line frontend.
const WHISPER_BIN: &str = "whisper-cli";

/// Speech engine backed by a whisper-cli subprocess per transcription.
#[derive(Debug)]
pub struct WhisperEngine {
    config: EngineConfig,
    segment_re: Regex,
}

impl WhisperEngine {
    /// Load the engine for the given model and device.
    ///
    /// Fails with [`TolkError::ModelLoad`] if the model file is missing;
    /// this is fatal and never retried.
    pub fn load(config: &EngineConfig) -> Result<Self> {
        if !Path::new(&config.model_path).is_file() {
            return Err(TolkError::ModelLoad(format!(
                "model file not found: {}",
                config.model_path
            )));
        }

        // whisper-cli prints segments as
        // [00:00:00.000 --> 00:00:30.000]   text
        let segment_re = Regex::new(
            r"^\[(\d{2}):(\d{2}):(\d{2})[.,](\d{3}) --> (\d{2}):(\d{2}):(\d{2})[.,](\d{3})\]\s*(.*)$",
        )
        .expect("Invalid regex");

        info!(
            "Loaded whisper engine (model: {}, device: {})",
            config.model_path, config.device
        );

        Ok(Self {
            config: config.clone(),
            segment_re,
        })
    }
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<(SegmentStream, TranscriptionInfo)> {
        let mut command = Command::new(WHISPER_BIN);
        command
            .arg("-m").arg(&self.config.model_path)
            .arg("-f").arg(audio_path)
            .arg("-bs").arg(self.config.beam_size.to_string())
            .arg("-l").arg(&self.config.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // Dropping the segment stream mid-file must not orphan a
            // child that keeps transcribing to nowhere.
            .kill_on_drop(true);

        if self.config.device == "cpu" {
            command.arg("--no-gpu");
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TolkError::ToolNotFound(WHISPER_BIN.to_string())
            } else {
                TolkError::Transcription(format!("failed to spawn {WHISPER_BIN}: {e}"))
            }
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TolkError::Transcription(format!("{WHISPER_BIN} produced no stdout handle"))
        })?;

        debug!("Spawned {} for {}", WHISPER_BIN, audio_path.display());

        let info = TranscriptionInfo {
            language: Some(self.config.language.clone()),
            language_probability: None,
            total_duration: None,
        };

        let state = StreamState {
            lines: BufReader::new(stdout).lines(),
            child,
            segment_re: self.segment_re.clone(),
            finished: false,
        };

        let segments = stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            loop {
                match state.lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(segment) = parse_segment_line(&state.segment_re, &line) {
                            return Some((Ok(segment), state));
                        }
                        // Progress chatter and blank lines are skipped.
                    }
                    Ok(None) => {
                        state.finished = true;
                        return match state.child.wait().await {
                            Ok(status) if status.success() => None,
                            Ok(status) => Some((
                                Err(TolkError::Transcription(format!(
                                    "{WHISPER_BIN} exited with {status}"
                                ))),
                                state,
                            )),
                            Err(e) => Some((
                                Err(TolkError::Transcription(format!(
                                    "{WHISPER_BIN} did not terminate cleanly: {e}"
                                ))),
                                state,
                            )),
                        };
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((
                            Err(TolkError::Transcription(format!(
                                "failed to read {WHISPER_BIN} output: {e}"
                            ))),
                            state,
                        ));
                    }
                }
            }
        });

        Ok((Box::pin(segments), info))
    }
}

struct StreamState {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    segment_re: Regex,
    finished: bool,
}

/// Parse a whisper-cli output line into a segment, if it is one.
fn parse_segment_line(re: &Regex, line: &str) -> Option<TranscriptSegment> {
    let caps = re.captures(line.trim_end())?;

    let seconds = |h: usize, m: usize, s: usize, ms: usize| -> f64 {
        let get = |i: usize| caps[i].parse::<f64>().unwrap_or(0.0);
        get(h) * 3600.0 + get(m) * 60.0 + get(s) + get(ms) / 1000.0
    };

    let start = seconds(1, 2, 3, 4);
    let end = seconds(5, 6, 7, 8);
    let text = caps[9].trim().to_string();

    Some(TranscriptSegment::new(start, end, text))
}
