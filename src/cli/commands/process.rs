//! The `process` command: run the full pipeline for one URL.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::error::{Result, TolkError};
use crate::pipeline::{Pipeline, PipelineEvent, PipelineRunner, Stage};
use crate::source::YoutubeSource;
use crate::synthesis::ClaudeGenerator;
use crate::transcription::EngineCache;
use std::sync::Arc;
use tracing::debug;

pub async fn run_process(
    url: &str,
    model: Option<String>,
    device: Option<String>,
    work_dir: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.transcription.model_path = model;
    }
    if let Some(device) = device {
        settings.transcription.device = device;
    }
    if let Some(work_dir) = work_dir {
        settings.general.work_dir = work_dir;
    }

    preflight::check(&settings)?;

    let api_key = settings
        .api_key()
        .ok_or_else(|| TolkError::Config("ANTHROPIC_API_KEY not set".to_string()))?;
    let generator = Arc::new(ClaudeGenerator::new(
        &api_key,
        &settings.synthesis.model,
        settings.synthesis.max_tokens,
    )?);

    let pipeline = Arc::new(Pipeline::new(
        settings,
        Arc::new(YoutubeSource::new()),
        Arc::new(EngineCache::whisper()),
        generator,
    ));

    let runner = PipelineRunner::new();
    let mut handle = runner.try_start(pipeline, url.to_string())?;

    let pb = Output::percent_bar();
    let mut stopping = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                handle.request_stop();
                pb.set_message("stop requested, finishing current stage...");
            }
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PipelineEvent::StageChanged(stage) => {
                        if matches!(stage, Stage::Acquiring | Stage::Transcribing | Stage::Synthesizing) {
                            pb.println(format!(">> {stage}"));
                        }
                    }
                    PipelineEvent::Progress(percent) => {
                        pb.set_position(percent as u64);
                    }
                    PipelineEvent::Log(message) => {
                        pb.set_message(message);
                    }
                    PipelineEvent::Completed { transcript_path, markdown_path } => {
                        pb.finish_and_clear();
                        Output::success("Process completed successfully.");
                        Output::kv("Transcript", &transcript_path.display().to_string());
                        Output::kv("Analysis", &markdown_path.display().to_string());
                    }
                    PipelineEvent::Failed(e) => {
                        pb.finish_and_clear();
                        Output::error(&e.to_string());
                        if let Some(state) = handle.join().await {
                            debug!("run ended in stage '{}' at {}%", state.stage, state.progress);
                        }
                        return Err(e);
                    }
                }
            }
        }
    }

    if let Some(state) = handle.join().await {
        debug!("run ended in stage '{}' at {}%", state.stage, state.progress);
    }
    Ok(())
}
