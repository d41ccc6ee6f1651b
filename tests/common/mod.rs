//! Common test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use sceneforge::core::{
    ArtifactStore, CompletionGateway, CompletionRequest, CompletionService, ExecutionOutcome,
    LineSink, Pipeline, PromptKind, ProgressSink, Published, Publisher, RenderJob, RenderedOutput, Renderer,
    RuleBook,
};
use sceneforge::error::{LlmError, PublishError, RenderError};
use sceneforge::models::{LimitsConfig, PipelineOutcome, ProgressEvent};

pub const VERSION_SUFFIX: &str = "_ManimCE_v0.19.0";

pub const CODE: &str = "```python\nfrom manim import *\n\nclass Scene1(Scene):\n    pass\n```";

/// Create a temporary project directory
pub fn create_test_project() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let project_root = temp_dir.path().to_path_buf();
    (temp_dir, project_root)
}

pub fn feasible(category: &str) -> String {
    format!(
        r#"{{"isFeasible": true, "reason": "drawable", "chatName": "Test animation", "category": "{}"}}"#,
        category
    )
}

pub fn infeasible(reason: &str) -> String {
    format!(
        r#"{{"isFeasible": false, "reason": "{}", "chatName": "Declined"}}"#,
        reason
    )
}

pub fn description(text: &str) -> String {
    format!(r#"{{"description": "{}"}}"#, text)
}

pub fn description_verdict(good: bool, error: &str) -> String {
    format!(r#"{{"isGood": {}, "error": "{}"}}"#, good, error)
}

pub fn code_verdict(good: bool, error: &str) -> String {
    format!(r#"{{"isCodeGood": {}, "errorMessage": "{}"}}"#, good, error)
}

/// LLM fake answering from per-kind queues, with optional per-kind fallbacks
#[derive(Default)]
pub struct ScriptedLlm {
    queues: Mutex<HashMap<PromptKind, VecDeque<Result<String, LlmError>>>>,
    fallbacks: Mutex<HashMap<PromptKind, String>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for a kind
    pub fn reply(self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Ok(text.into()));
        self
    }

    /// Queue the same reply `times` times
    pub fn replies(mut self, kind: PromptKind, text: &str, times: usize) -> Self {
        for _ in 0..times {
            self = self.reply(kind, text);
        }
        self
    }

    pub fn fail(self, kind: PromptKind, err: LlmError) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Err(err));
        self
    }

    /// Reply used once a kind's queue is empty
    pub fn always(self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.fallbacks.lock().unwrap().insert(kind, text.into());
        self
    }

    /// Replies for a run that succeeds first time
    pub fn happy_path(self) -> Self {
        self.always(PromptKind::Feasibility, feasible("GRAPH2D"))
            .always(PromptKind::Describe, description("A blue circle grows for two seconds."))
            .always(PromptKind::ValidateDescription, description_verdict(true, ""))
            .always(PromptKind::GenerateCode, CODE)
            .always(PromptKind::CheckCode, code_verdict(true, ""))
            .always(PromptKind::RepairCode, CODE)
    }

    pub fn calls(&self, kind: PromptKind) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, kind: PromptKind) -> usize {
        self.calls(kind).len()
    }
}

#[async_trait]
impl CompletionService for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(reply) = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.kind)
            .and_then(|q| q.pop_front())
        {
            return reply;
        }
        match self.fallbacks.lock().unwrap().get(&request.kind) {
            Some(text) => Ok(text.clone()),
            None => Err(LlmError::RequestFailed(format!(
                "no reply scripted for {}",
                request.kind
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Renderer fake: plays queued outcomes, then succeeds
///
/// A successful render writes a fake video where the real renderer would.
pub struct ScriptedRenderer {
    media_dir: PathBuf,
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    scenes: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedRenderer {
    pub fn new(media_dir: &Path) -> Self {
        Self {
            media_dir: media_dir.to_path_buf(),
            outcomes: Mutex::new(VecDeque::new()),
            scenes: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn then(self, outcome: ExecutionOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue `times` failures with a traceback naming the attempt
    pub fn failing(mut self, times: usize) -> Self {
        for i in 0..times {
            self = self.then(render_failure(&format!("NameError: attempt {}", i + 1)));
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Scene names passed to every render, in order
    pub fn scenes(&self) -> Vec<String> {
        self.scenes.lock().unwrap().clone()
    }
}

pub fn render_failure(message: &str) -> ExecutionOutcome {
    ExecutionOutcome::failure(&[
        "Manim Community v0.19.0".to_string(),
        "Traceback (most recent call last):".to_string(),
        message.to_string(),
    ])
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, job: &RenderJob, on_line: LineSink<'_>) -> Result<ExecutionOutcome, RenderError> {
        self.scenes.lock().unwrap().push(job.scene_name.clone());
        assert!(job.source.exists(), "staged source must exist before rendering");
        on_line(&format!("Rendering {}", job.scene_name));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ExecutionOutcome::success);

        if outcome.succeeded {
            fs::create_dir_all(&self.media_dir).map_err(RenderError::Output)?;
            let rendered = self.media_dir.join(format!(
                "{}{}.{}",
                job.scene_name,
                VERSION_SUFFIX,
                job.format.extension()
            ));
            fs::write(&rendered, b"fake video").map_err(RenderError::Output)?;
            let partial = self.media_dir.join("partial_movie_files").join(&job.scene_name);
            fs::create_dir_all(&partial).map_err(RenderError::Output)?;
        }
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Publisher fake that keeps published files in memory
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(stem, _)| stem.clone())
            .collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, rendered: &Path, stem: &str) -> Result<Published, PublishError> {
        let bytes = fs::read(rendered)
            .map_err(|_| PublishError::OutputNotFound(rendered.display().to_string()))?;
        self.published.lock().unwrap().push((stem.to_string(), bytes));
        Ok(Published {
            location: PathBuf::from("memory").join(stem),
            link: format!("memory://{}", stem),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Progress sink recording every event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
    pub output_lines: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<PipelineOutcome>>,
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_output(&self, _run_id: &str, line: &str) {
        self.output_lines.lock().unwrap().push(line.to_string());
    }

    fn on_finished(&self, outcome: &PipelineOutcome) {
        self.finished.lock().unwrap().push(outcome.clone());
    }
}

/// Fakes wired into a pipeline rooted at a temporary project
pub struct Harness {
    pub project_root: PathBuf,
    pub llm: Arc<ScriptedLlm>,
    pub renderer: Arc<ScriptedRenderer>,
    pub publisher: Arc<MemoryPublisher>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(project_root: &Path, llm: ScriptedLlm, renderer: ScriptedRenderer) -> Self {
        Self::with_limits(project_root, llm, renderer, LimitsConfig::default())
    }

    pub fn with_limits(
        project_root: &Path,
        llm: ScriptedLlm,
        renderer: ScriptedRenderer,
        limits: LimitsConfig,
    ) -> Self {
        let llm = Arc::new(llm);
        let renderer = Arc::new(renderer);
        let publisher = Arc::new(MemoryPublisher::new());
        let pipeline = Pipeline::new(
            CompletionGateway::new(llm.clone(), Duration::from_secs(5)),
            renderer.clone(),
            publisher.clone(),
            ArtifactStore::new(staging_dir(project_root)),
            RenderedOutput::new(media_dir(project_root), VERSION_SUFFIX),
            RuleBook::builtin(),
            limits,
        );
        Self {
            project_root: project_root.to_path_buf(),
            llm,
            renderer,
            publisher,
            pipeline,
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        staging_dir(&self.project_root)
    }

    pub fn media_dir(&self) -> PathBuf {
        media_dir(&self.project_root)
    }
}

pub fn staging_dir(project_root: &Path) -> PathBuf {
    project_root.join("staging")
}

pub fn media_dir(project_root: &Path) -> PathBuf {
    project_root.join("videos")
}
