//! Pipeline orchestrator for Tolk.
//!
//! Sequences acquisition, transcription, and synthesis for one source
//! reference, reporting progress, stage transitions, and exactly one
//! terminal notification per run over a typed event channel.

use crate::acquire::{acquire, AudioArtifact};
use crate::config::Settings;
use crate::error::{Result, TolkError};
use crate::retry::RetryPolicy;
use crate::source::MediaSource;
use crate::synthesis::{synthesize, write_markdown, DocumentGenerator};
use crate::transcription::{transcribe_to_file, EngineCache, EngineConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Acquiring,
    Transcribing,
    Synthesizing,
    Completed,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Acquiring => "acquiring",
            Stage::Transcribing => "transcribing",
            Stage::Synthesizing => "synthesizing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Typed event delivered to the run's observer, in emission order.
#[derive(Debug)]
pub enum PipelineEvent {
    /// The run entered a new stage.
    StageChanged(Stage),
    /// Global progress, 0–100, never decreasing within a run.
    Progress(u8),
    /// Human-readable stage log line.
    Log(String),
    /// Terminal: the run succeeded and both artifacts exist on disk.
    Completed {
        transcript_path: PathBuf,
        markdown_path: PathBuf,
    },
    /// Terminal: the run failed; artifacts already written are left in
    /// place so a rerun can hit the acquisition cache.
    Failed(TolkError),
}

/// Successful run output.
#[derive(Debug)]
pub struct RunOutput {
    pub title: String,
    pub transcript_path: PathBuf,
    pub markdown_path: PathBuf,
}

/// Mutable state of one run, owned by the orchestrator.
///
/// Progress is monotonically non-decreasing and reaches exactly 100 only
/// on the transition to [`Stage::Completed`].
#[derive(Debug, Clone)]
pub struct RunState {
    pub stage: Stage,
    pub progress: u8,
    pub last_error: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            progress: 0,
            last_error: None,
        }
    }

    fn enter(&mut self, stage: Stage, ctx: &RunContext) {
        self.stage = stage;
        ctx.emit(PipelineEvent::StageChanged(stage));
    }

    /// Advance progress, clamped so observers never see it decrease.
    fn advance(&mut self, percent: u8, ctx: &RunContext) {
        self.progress = self.progress.max(percent);
        ctx.emit(PipelineEvent::Progress(self.progress));
    }

    fn fail(&mut self, error: &TolkError, ctx: &RunContext) {
        self.stage = Stage::Failed;
        self.last_error = Some(error.to_string());
        ctx.emit(PipelineEvent::StageChanged(Stage::Failed));
    }
}

/// Per-run context: the event channel plus the cooperative stop flag.
#[derive(Clone)]
pub struct RunContext {
    events: UnboundedSender<PipelineEvent>,
    stop: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                events: tx,
                stop: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    fn emit(&self, event: PipelineEvent) {
        // A dropped receiver means nobody is observing; the run proceeds.
        let _ = self.events.send(event);
    }

    fn log(&self, message: impl Into<String>) {
        self.emit(PipelineEvent::Log(message.into()));
    }

    /// Request a cooperative stop: no further stage is started. A stage
    /// already blocking on external I/O may complete first.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn ensure_not_stopped(&self, next_stage: &str) -> Result<()> {
        if self.stop_requested() {
            Err(TolkError::Stopped(next_stage.to_string()))
        } else {
            Ok(())
        }
    }
}

/// The pipeline: collaborators plus configuration, reusable across runs.
pub struct Pipeline {
    settings: Settings,
    source: Arc<dyn MediaSource>,
    engines: Arc<EngineCache>,
    generator: Arc<dyn DocumentGenerator>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        source: Arc<dyn MediaSource>,
        engines: Arc<EngineCache>,
        generator: Arc<dyn DocumentGenerator>,
    ) -> Self {
        Self {
            settings,
            source,
            engines,
            generator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute one run: acquire, transcribe, synthesize.
    ///
    /// Emits progress, log, and stage-change events through `ctx` and
    /// records the outcome in `state`; the terminal notification is the
    /// caller's (runner's) responsibility, derived from the returned
    /// result.
    #[instrument(skip(self, ctx, state), fields(reference = %reference))]
    pub async fn run(
        &self,
        reference: &str,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<RunOutput> {
        match self.execute(reference, ctx, state).await {
            Ok(output) => {
                // 100 is only ever reached here, on explicit completion.
                state.enter(Stage::Completed, ctx);
                state.advance(100, ctx);
                info!("Run completed for '{}'", output.title);
                Ok(output)
            }
            Err(e) => {
                state.fail(&e, ctx);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        reference: &str,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<RunOutput> {
        let work_dir = self.settings.work_dir();
        std::fs::create_dir_all(&work_dir)?;

        ctx.log("Starting process...");
        state.advance(0, ctx);

        // A stop that lands before the task first polls must prevent
        // even the download from starting.
        ctx.ensure_not_stopped("acquisition")?;

        // Acquisition owns the cache: a rerun over prior artifacts skips
        // the download entirely.
        state.enter(Stage::Acquiring, ctx);
        ctx.log("Downloading or locating audio file...");
        let artifact = acquire(self.source.as_ref(), reference, &work_dir).await?;
        ctx.log(format!("Using audio file: {}", artifact.path.display()));

        if !artifact.path.exists() {
            return Err(TolkError::CacheInconsistency(
                artifact.path.display().to_string(),
            ));
        }

        ctx.ensure_not_stopped("transcription")?;
        state.enter(Stage::Transcribing, ctx);
        ctx.log("Starting transcription process...");

        let transcript_path = self.transcribe(&artifact, ctx, state).await?;
        ctx.log("Transcription completed");

        ctx.ensure_not_stopped("synthesis")?;
        state.enter(Stage::Synthesizing, ctx);
        ctx.log("Preparing to send transcript for analysis...");

        let markdown_path = self.synthesize(&artifact, &transcript_path, ctx).await?;
        ctx.log(format!(
            "Markdown content written to file: {}",
            markdown_path.display()
        ));

        Ok(RunOutput {
            title: artifact.title,
            transcript_path,
            markdown_path,
        })
    }

    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<PathBuf> {
        let engine_config = EngineConfig {
            model_path: self.settings.model_path().display().to_string(),
            device: self.settings.transcription.device.clone(),
            beam_size: self.settings.transcription.beam_size,
            language: self.settings.transcription.language.clone(),
        };
        let engine = self.engines.get(&engine_config)?;

        let transcript_path = self
            .settings
            .work_dir()
            .join(format!("{}.txt", artifact.stem()));

        let transcript = transcribe_to_file(engine.as_ref(), artifact, &transcript_path, |update| {
            state.advance(update.percent, ctx);
            ctx.log(format!("Transcribed and wrote segment: {}", update.line));
        })
        .await?;

        if transcript.segments.is_empty() {
            warn!("Engine produced no segments for '{}'", artifact.title);
        }

        Ok(transcript_path)
    }

    async fn synthesize(
        &self,
        artifact: &AudioArtifact,
        transcript_path: &std::path::Path,
        ctx: &RunContext,
    ) -> Result<PathBuf> {
        let transcript_text = tokio::fs::read_to_string(transcript_path).await?;
        ctx.log("Transcript read successfully. Sending for analysis...");

        let retry = RetryPolicy::new(
            self.settings.synthesis.max_attempts,
            Duration::from_secs(self.settings.synthesis.retry_delay_seconds),
        );

        let document = synthesize(self.generator.as_ref(), &retry, &transcript_text).await?;
        ctx.log("Received analysis response. Writing to file...");

        let markdown_path = self
            .settings
            .work_dir()
            .join(format!("{}_analysis.md", artifact.stem()));
        write_markdown(&markdown_path, &document)?;

        Ok(markdown_path)
    }
}

/// Spawns pipeline runs, one at a time.
///
/// The pipeline's run state is not safe for concurrent mutation, and
/// artifacts are keyed by derived title in a shared working directory, so
/// a second start while a run is active is rejected with
/// [`TolkError::RunActive`] rather than interleaved.
pub struct PipelineRunner {
    active: Arc<AtomicBool>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRunner {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a run on its own task.
    ///
    /// The returned handle carries the event receiver; the task emits
    /// exactly one terminal event (`Completed` or `Failed`) before it
    /// finishes.
    pub fn try_start(&self, pipeline: Arc<Pipeline>, reference: String) -> Result<RunHandle> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(TolkError::RunActive);
        }

        let guard = ActiveGuard(self.active.clone());
        let (ctx, events) = RunContext::new();
        let stop = ctx.stop.clone();

        // The spawned task owns the only sender, so the event channel
        // closes exactly when the run finishes. The final run state is
        // the task's output, observable through `RunHandle::join`.
        let task = tokio::spawn(async move {
            let _guard = guard;
            let mut state = RunState::new();
            match pipeline.run(&reference, &ctx, &mut state).await {
                Ok(output) => ctx.emit(PipelineEvent::Completed {
                    transcript_path: output.transcript_path,
                    markdown_path: output.markdown_path,
                }),
                // run() already reported the Failed stage transition.
                Err(e) => ctx.emit(PipelineEvent::Failed(e)),
            }
            state
        });

        Ok(RunHandle { events, stop, task })
    }
}

struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    /// Ordered event stream for this run.
    pub events: UnboundedReceiver<PipelineEvent>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<RunState>,
}

impl RunHandle {
    /// Request a cooperative stop of the run.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for the run task to finish, returning its final state.
    /// `None` means the task panicked.
    pub async fn join(self) -> Option<RunState> {
        self.task.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MediaInfo, MediaSource};
    use crate::synthesis::ApiStatus;
    use crate::transcription::{
        SegmentStream, SpeechEngine, TranscriptSegment, TranscriptionInfo,
    };
    use async_trait::async_trait;
    use futures::stream;
    use std::path::Path;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Notify;

    struct FakeSource;

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn resolve(&self, _reference: &str) -> Result<MediaInfo> {
            Ok(MediaInfo {
                title: "Example Title".to_string(),
                duration_seconds: 120.0,
                has_audio: true,
                source_url: "https://example.com/watch".to_string(),
            })
        }

        async fn download(&self, _info: &MediaInfo, destination: &Path) -> Result<PathBuf> {
            std::fs::write(destination, b"audio")?;
            Ok(destination.to_path_buf())
        }
    }

    struct ScriptedEngine {
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        async fn transcribe(
            &self,
            _audio_path: &Path,
        ) -> Result<(SegmentStream, TranscriptionInfo)> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let segments = vec![
                Ok(TranscriptSegment::new(0.0, 30.0, "one".into())),
                Ok(TranscriptSegment::new(30.0, 75.0, "two".into())),
                Ok(TranscriptSegment::new(75.0, 120.0, "three".into())),
            ];
            Ok((Box::pin(stream::iter(segments)), TranscriptionInfo::default()))
        }
    }

    struct ScriptedGenerator {
        overload_failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.overload_failures {
                return Err(TolkError::Synthesis {
                    status: ApiStatus::Overloaded,
                    message: "temporarily overloaded".into(),
                });
            }
            Ok("# Analysis\n\n## Summary\n\n## Key Points\n\n\
                ## Detailed Breakdown\n\n## Conclusion\n\n## Metadata\n"
                .to_string())
        }
    }

    fn test_pipeline(
        work_dir: &Path,
        gate: Option<Arc<Notify>>,
        overload_failures: u32,
    ) -> Arc<Pipeline> {
        let mut settings = Settings::default();
        settings.general.work_dir = work_dir.display().to_string();

        let engines = EngineCache::new(move |_| {
            Ok(Arc::new(ScriptedEngine { gate: gate.clone() }) as Arc<dyn SpeechEngine>)
        });

        Arc::new(Pipeline::new(
            settings,
            Arc::new(FakeSource),
            Arc::new(engines),
            Arc::new(ScriptedGenerator {
                overload_failures,
                calls: AtomicU32::new(0),
            }),
        ))
    }

    async fn collect_events(mut handle: RunHandle) -> (Vec<PipelineEvent>, RunState) {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        let state = handle.join().await.expect("run task panicked");
        (events, state)
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), None, 0);
        let runner = PipelineRunner::new();

        let handle = runner
            .try_start(pipeline, "https://example.com/watch".to_string())
            .unwrap();
        let (events, state) = collect_events(handle).await;

        assert_eq!(state.stage, Stage::Completed);
        assert_eq!(state.progress, 100);
        assert!(state.last_error.is_none());

        // Progress is monotonic, passes through the per-segment values,
        // and ends at exactly 100.
        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.contains(&25));
        assert!(progress.contains(&62));
        assert!(progress.contains(&99));
        assert_eq!(*progress.last().unwrap(), 100);
        assert!(progress[..progress.len() - 1].iter().all(|p| *p < 100));

        // Exactly one terminal event, and it is Completed.
        let terminals: Vec<&PipelineEvent> = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    PipelineEvent::Completed { .. } | PipelineEvent::Failed(_)
                )
            })
            .collect();
        assert_eq!(terminals.len(), 1);

        let (transcript_path, markdown_path) = match terminals[0] {
            PipelineEvent::Completed {
                transcript_path,
                markdown_path,
            } => (transcript_path.clone(), markdown_path.clone()),
            other => panic!("expected Completed, got {other:?}"),
        };

        let transcript = std::fs::read_to_string(&transcript_path).unwrap();
        assert_eq!(
            transcript.lines().collect::<Vec<_>>(),
            vec![
                "[0.00s -> 30.00s] one",
                "[30.00s -> 75.00s] two",
                "[75.00s -> 120.00s] three",
            ]
        );

        let markdown = std::fs::read_to_string(&markdown_path).unwrap();
        for header in [
            "## Summary",
            "## Key Points",
            "## Detailed Breakdown",
            "## Conclusion",
            "## Metadata",
        ] {
            assert!(markdown.contains(header), "missing header: {header}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_exhaustion_leaves_transcript() {
        let dir = tempfile::tempdir().unwrap();
        // Overloads on every attempt; default policy gives up after 3.
        let pipeline = test_pipeline(dir.path(), None, u32::MAX);
        let runner = PipelineRunner::new();

        let handle = runner
            .try_start(pipeline, "https://example.com/watch".to_string())
            .unwrap();
        let (events, state) = collect_events(handle).await;

        let failure = events
            .iter()
            .find_map(|e| match e {
                PipelineEvent::Failed(err) => Some(err),
                _ => None,
            })
            .expect("run should fail");
        assert!(matches!(
            failure,
            TolkError::SynthesisExhausted { attempts: 3, .. }
        ));

        // The final run state records the terminal error.
        assert_eq!(state.stage, Stage::Failed);
        let recorded = state.last_error.expect("failure should be recorded");
        assert!(recorded.contains("3 attempts"));

        // Stage sequence reached Synthesizing then Failed; 100 never sent.
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::StageChanged(Stage::Failed))));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Progress(100))));

        // Prior-stage artifact remains on disk, unmodified.
        let transcript_path = dir.path().join("Example_Title.txt");
        let transcript = std::fs::read_to_string(&transcript_path).unwrap();
        assert_eq!(transcript.lines().count(), 3);

        // No markdown was written.
        assert!(!dir.path().join("Example_Title_analysis.md").exists());
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let pipeline = test_pipeline(dir.path(), Some(gate.clone()), 0);
        let runner = PipelineRunner::new();

        let first = runner
            .try_start(pipeline.clone(), "https://example.com/a".to_string())
            .unwrap();

        let second = runner.try_start(pipeline, "https://example.com/b".to_string());
        assert!(matches!(second.unwrap_err(), TolkError::RunActive));

        gate.notify_one();
        collect_events(first).await;

        // Slot is free again once the first run finishes.
        let dir2 = tempfile::tempdir().unwrap();
        let pipeline2 = test_pipeline(dir2.path(), None, 0);
        assert!(runner
            .try_start(pipeline2, "https://example.com/c".to_string())
            .is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path(), None, 0);
        let runner = PipelineRunner::new();

        let handle = runner
            .try_start(pipeline, "https://example.com/watch".to_string())
            .unwrap();
        // The stop lands before the spawned task first polls; not even
        // acquisition may start.
        handle.request_stop();

        let (events, state) = collect_events(handle).await;

        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::StageChanged(Stage::Acquiring))));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::Failed(TolkError::Stopped(stage)) if stage == "acquisition"
        )));
        assert_eq!(state.stage, Stage::Failed);
    }

    #[tokio::test]
    async fn test_stop_prevents_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let pipeline = test_pipeline(dir.path(), Some(gate.clone()), 0);
        let runner = PipelineRunner::new();

        let mut handle = runner
            .try_start(pipeline, "https://example.com/watch".to_string())
            .unwrap();

        // Stop once the run is blocked inside the engine; transcription
        // finishes, but synthesis must never start.
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            let transcribing = matches!(event, PipelineEvent::StageChanged(Stage::Transcribing));
            events.push(event);
            if transcribing {
                handle.request_stop();
                gate.notify_one();
            }
        }
        let state = handle.join().await.expect("run task panicked");

        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::Failed(TolkError::Stopped(stage)) if stage == "synthesis"
        )));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::StageChanged(Stage::Synthesizing))));
        assert_eq!(state.stage, Stage::Failed);

        // The stage that already ran left its artifact behind.
        assert!(dir.path().join("Example_Title.txt").exists());
    }
}
