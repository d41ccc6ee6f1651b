//! Code generation and repair loop
//!
//! `CreateFile -> CheckCode -> {Run, Repair, GiveUp}`, `Run -> {Done, Repair, GiveUp}`,
//! `Repair -> CheckCode` and `GiveUp -> {CreateFile, Exhausted}` via the reset
//! controller. Validation and execution failures share one repair counter.

use std::io;
use tracing::{debug, info, warn};

use crate::core::artifact::{Artifact, ArtifactStore};
use crate::core::history::ErrorHistory;
use crate::core::llm::CompletionGateway;
use crate::core::parser::{extract_code, non_empty, CodeVerdict};
use crate::core::progress::ProgressReporter;
use crate::core::prompts::{self, CodeContext, CurrentFailure};
use crate::core::renderer::{ExecutionOutcome, RenderJob, Renderer};
use crate::core::reset::{ResetController, ResetDecision};
use crate::error::{RenderError, Result};
use crate::models::{
    Category, FailureChannel, OutputFormat, PipelineRequest, QualityTier, Resolution, RunCounters,
    Stage,
};

/// Mutable state of the generation loop for one run
#[derive(Debug)]
pub struct GenerationState {
    pub description: String,
    pub category: Category,
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub quality: QualityTier,
    /// The one live staged file; replaced only by a reset
    artifact: Option<Artifact>,
    pub generated_code: Option<String>,
    pub is_statically_valid: Option<bool>,
    pub static_validation_error: Option<String>,
    pub execution_error: Option<String>,
    pub execution_succeeded: Option<bool>,
    /// Validation and execution histories
    pub history: ErrorHistory,
    pub repair_attempts: u32,
    pub reset_count: u32,
    /// Code writes (fresh generations and repairs) across all resets
    pub generation_cycles: u32,
    /// Channel of the most recent failure
    pub last_failure: Option<FailureChannel>,
}

impl GenerationState {
    pub fn new(description: impl Into<String>, category: Category, request: &PipelineRequest) -> Self {
        Self {
            description: description.into(),
            category,
            format: request.format,
            resolution: request.resolution,
            quality: request.quality,
            artifact: None,
            generated_code: None,
            is_statically_valid: None,
            static_validation_error: None,
            execution_error: None,
            execution_succeeded: None,
            history: ErrorHistory::new(),
            repair_attempts: 0,
            reset_count: 0,
            generation_cycles: 0,
            last_failure: None,
        }
    }

    /// Scene class name and file stem of the live artifact
    pub fn scene_name(&self) -> Option<&str> {
        self.artifact.as_ref().map(Artifact::name)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn artifact_mut(&mut self) -> Option<&mut Artifact> {
        self.artifact.as_mut()
    }

    /// Take ownership of a freshly created artifact, dropping any previous one
    pub fn install_artifact(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
    }

    fn require_artifact(&self) -> Result<&Artifact> {
        self.artifact.as_ref().ok_or_else(|| {
            RenderError::Artifact(
                "<none>".into(),
                io::Error::new(io::ErrorKind::NotFound, "no staged artifact for this run"),
            )
            .into()
        })
    }

    /// Record the static reviewer's verdict
    pub fn record_validation(&mut self, is_valid: bool, error: Option<String>) {
        self.is_statically_valid = Some(is_valid);
        if is_valid {
            self.static_validation_error = None;
            return;
        }
        let error = error.unwrap_or_else(|| "code review rejected the file without details".to_string());
        self.history.push(FailureChannel::Validation, error.clone());
        self.static_validation_error = Some(error);
        self.last_failure = Some(FailureChannel::Validation);
    }

    /// Fold a render result into the state
    ///
    /// Success clears both histories and every error field at once.
    pub fn record_execution(&mut self, outcome: &ExecutionOutcome) {
        self.execution_succeeded = Some(outcome.succeeded);
        if outcome.succeeded {
            self.history.clear();
            self.static_validation_error = None;
            self.execution_error = None;
            self.last_failure = None;
            return;
        }
        let error = outcome.error_text();
        debug!("Raw render output:\n{}", outcome.raw_output);
        self.history.push(FailureChannel::Execution, error.clone());
        self.execution_error = Some(error);
        self.last_failure = Some(FailureChannel::Execution);
    }

    /// Error text of the most recent failure and its channel
    pub fn current_failure(&self) -> Option<(FailureChannel, &str)> {
        let channel = self.last_failure?;
        let message = match channel {
            FailureChannel::Validation => self.static_validation_error.as_deref(),
            FailureChannel::Execution => self.execution_error.as_deref(),
        }?;
        Some((channel, message))
    }

    /// Start code generation over: new artifact on the next CreateFile, zeroed repairs
    pub(crate) fn restart(&mut self) {
        self.artifact = None;
        self.generated_code = None;
        self.is_statically_valid = None;
        self.execution_succeeded = None;
        self.repair_attempts = 0;
        self.reset_count += 1;
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            refinement_count: 0,
            repair_attempts: self.repair_attempts,
            reset_count: self.reset_count,
            generation_cycles: self.generation_cycles,
        }
    }
}

/// Steps of the generation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStep {
    CreateFile,
    CheckCode,
    Run,
    Repair,
    GiveUp,
    Done,
}

/// How the loop ended when no collaborator failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEnd {
    /// The render succeeded
    Rendered,
    /// Repair and reset budgets are spent
    Exhausted {
        /// Stage of the channel that caused the final GiveUp
        stage: Stage,
        reason: String,
    },
}

/// Drives a [`GenerationState`] through the loop
pub struct GenerationLoop<'a> {
    gateway: &'a CompletionGateway,
    renderer: &'a dyn Renderer,
    store: &'a ArtifactStore,
    rules: &'a str,
    max_repairs: u32,
    resets: ResetController,
}

impl<'a> GenerationLoop<'a> {
    pub fn new(
        gateway: &'a CompletionGateway,
        renderer: &'a dyn Renderer,
        store: &'a ArtifactStore,
        rules: &'a str,
        max_repairs: u32,
        resets: ResetController,
    ) -> Self {
        Self {
            gateway,
            renderer,
            store,
            rules,
            max_repairs,
            resets,
        }
    }

    /// Routing after a failed check or render
    pub fn route_failure(&self, state: &GenerationState) -> GenerationStep {
        if state.repair_attempts >= self.max_repairs {
            GenerationStep::GiveUp
        } else {
            GenerationStep::Repair
        }
    }

    fn context<'s>(&'s self, state: &'s GenerationState, scene_name: &'s str) -> CodeContext<'s> {
        CodeContext {
            description: &state.description,
            category: state.category,
            rules: self.rules,
            scene_name,
            resolution: state.resolution,
        }
    }

    /// Run until the render succeeds or every budget is spent
    ///
    /// `Err` means a collaborator failed in a way that is not retried; the state
    /// keeps whatever the loop had produced so far.
    pub async fn run(&self, state: &mut GenerationState, reporter: &ProgressReporter) -> Result<GenerationEnd> {
        let mut step = GenerationStep::CreateFile;

        loop {
            debug!("Generation step {:?} (repairs {}, resets {})", step, state.repair_attempts, state.reset_count);
            step = match step {
                GenerationStep::CreateFile => self.create_file(state, reporter).await?,
                GenerationStep::CheckCode => self.check_code(state, reporter).await?,
                GenerationStep::Run => self.execute(state, reporter).await?,
                GenerationStep::Repair => self.repair(state, reporter).await?,
                GenerationStep::GiveUp => match self.resets.handle_give_up(state) {
                    ResetDecision::Restart => {
                        reporter.report(
                            Stage::Reset,
                            Some(format!(
                                "restarting code generation (reset {}/{})",
                                state.reset_count,
                                self.resets.max_resets()
                            )),
                        );
                        GenerationStep::CreateFile
                    }
                    ResetDecision::Stop => return Ok(exhausted(state)),
                },
                GenerationStep::Done => return Ok(GenerationEnd::Rendered),
            };
        }
    }

    async fn create_file(&self, state: &mut GenerationState, reporter: &ProgressReporter) -> Result<GenerationStep> {
        if state.artifact.is_none() {
            state.install_artifact(self.store.create()?);
        }
        let request = {
            let artifact = state.require_artifact()?;
            reporter.report(
                Stage::CodeGeneration,
                Some(format!("generating {}", artifact.name())),
            );
            prompts::generate_code(&self.context(state, artifact.name()), &state.history)
        };

        let code = extract_code(&self.gateway.text(&request).await?);
        state.require_artifact()?.write(&code)?;
        state.generated_code = Some(code);
        state.generation_cycles += 1;
        info!("Generated code (cycle {})", state.generation_cycles);
        Ok(GenerationStep::CheckCode)
    }

    async fn check_code(&self, state: &mut GenerationState, reporter: &ProgressReporter) -> Result<GenerationStep> {
        reporter.report(Stage::CodeValidation, Some("reviewing generated code".to_string()));
        let request = {
            let artifact = state.require_artifact()?;
            let code = artifact.read()?;
            let request = prompts::check_code(&self.context(state, artifact.name()), &code);
            state.generated_code = Some(code);
            request
        };

        let verdict: CodeVerdict = self.gateway.structured(&request).await?;
        state.record_validation(verdict.is_code_good, non_empty(&verdict.error_message));

        if verdict.is_code_good {
            debug!("Code review passed");
            return Ok(GenerationStep::Run);
        }
        warn!(
            "Code review failed (repair {}/{}): {}",
            state.repair_attempts,
            self.max_repairs,
            state.static_validation_error.as_deref().unwrap_or_default()
        );
        Ok(self.route_failure(state))
    }

    async fn execute(&self, state: &mut GenerationState, reporter: &ProgressReporter) -> Result<GenerationStep> {
        let job = {
            let artifact = state.require_artifact()?;
            reporter.report(Stage::Render, Some(format!("rendering {}", artifact.name())));
            RenderJob {
                source: artifact.path().to_path_buf(),
                scene_name: artifact.name().to_string(),
                format: state.format,
                resolution: state.resolution,
                quality: state.quality,
            }
        };

        let outcome = self
            .renderer
            .render(&job, &|line: &str| reporter.output_line(line))
            .await?;
        state.record_execution(&outcome);

        if outcome.succeeded {
            return Ok(GenerationStep::Done);
        }
        Ok(self.route_failure(state))
    }

    async fn repair(&self, state: &mut GenerationState, reporter: &ProgressReporter) -> Result<GenerationStep> {
        state.repair_attempts += 1;
        let request = {
            let artifact = state.require_artifact()?;
            let current = state.current_failure().map(|(channel, message)| CurrentFailure { channel, message });
            reporter.report(
                Stage::Repair,
                Some(format!(
                    "repair {}/{} after {} failure",
                    state.repair_attempts,
                    self.max_repairs,
                    current.map(|c| c.channel.lowercase_name()).unwrap_or("unknown")
                )),
            );
            let code = state.generated_code.as_deref().unwrap_or_default();
            prompts::repair_code(&self.context(state, artifact.name()), code, current, &state.history)
        };

        let code = extract_code(&self.gateway.text(&request).await?);
        state.require_artifact()?.write(&code)?;
        state.generated_code = Some(code);
        state.is_statically_valid = None;
        state.execution_succeeded = None;
        state.generation_cycles += 1;
        info!("Repaired code (repair {}/{})", state.repair_attempts, self.max_repairs);
        Ok(GenerationStep::CheckCode)
    }
}

fn exhausted(state: &GenerationState) -> GenerationEnd {
    let (stage, reason) = match state.current_failure() {
        Some((FailureChannel::Validation, message)) => (Stage::CodeValidation, message.to_string()),
        Some((FailureChannel::Execution, message)) => (Stage::Render, message.to_string()),
        None => (Stage::Render, "code generation failed without an error message".to_string()),
    };
    GenerationEnd::Exhausted { stage, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::scripted::{gateway, ScriptedService};
    use crate::core::llm::PromptKind;
    use crate::core::renderer::LineSink;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const GOOD: &str = r#"{"isCodeGood": true, "errorMessage": ""}"#;
    const BAD: &str = r#"{"isCodeGood": false, "errorMessage": "ShowCreation was removed"}"#;
    const CODE: &str = "```python\nfrom manim import *\n```";

    struct QueuedRenderer {
        outcomes: Mutex<VecDeque<ExecutionOutcome>>,
        scenes: Mutex<Vec<String>>,
    }

    impl QueuedRenderer {
        fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                scenes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Renderer for QueuedRenderer {
        async fn render(&self, job: &RenderJob, on_line: LineSink<'_>) -> std::result::Result<ExecutionOutcome, RenderError> {
            on_line("rendering");
            self.scenes.lock().unwrap().push(job.scene_name.clone());
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(ExecutionOutcome::success))
        }

        fn name(&self) -> &str {
            "queued"
        }
    }

    fn render_failure(message: &str) -> ExecutionOutcome {
        ExecutionOutcome::failure(&[format!("Traceback: {}", message)])
    }

    fn new_state() -> GenerationState {
        GenerationState::new("a circle", Category::Graph2d, &PipelineRequest::new("circle"))
    }

    #[test]
    fn test_success_clears_histories() {
        let mut state = new_state();
        state.record_validation(false, Some("bad import".to_string()));
        state.record_execution(&render_failure("NameError"));
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.current_failure().map(|(c, _)| c), Some(FailureChannel::Execution));

        state.record_execution(&ExecutionOutcome::success());
        assert!(state.history.is_empty());
        assert!(state.static_validation_error.is_none());
        assert!(state.execution_error.is_none());
        assert!(state.current_failure().is_none());
    }

    #[tokio::test]
    async fn test_validation_failures_then_success() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let service = Arc::new(
            ScriptedService::new()
                .reply(PromptKind::GenerateCode, CODE)
                .reply(PromptKind::CheckCode, BAD)
                .reply(PromptKind::RepairCode, CODE)
                .reply(PromptKind::CheckCode, BAD)
                .reply(PromptKind::RepairCode, CODE)
                .reply(PromptKind::CheckCode, GOOD),
        );
        let gateway = gateway(&service);
        let renderer = QueuedRenderer::new(vec![ExecutionOutcome::success()]);
        let generation = GenerationLoop::new(&gateway, &renderer, &store, "rules", 3, ResetController::new(1));

        let mut state = new_state();
        let end = generation.run(&mut state, &ProgressReporter::new()).await.unwrap();

        assert_eq!(end, GenerationEnd::Rendered);
        assert_eq!(state.repair_attempts, 2);
        assert_eq!(state.reset_count, 0);
        assert!(state.history.is_empty());
        assert_eq!(state.generated_code.as_deref(), Some("from manim import *"));
        // The second repair sees both earlier review failures
        let repairs = service.calls(PromptKind::RepairCode);
        assert!(repairs[1].user.contains("### Attempt 2"));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_channel() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let mut service = ScriptedService::new().reply(PromptKind::GenerateCode, CODE);
        for _ in 0..4 {
            service = service.reply(PromptKind::CheckCode, BAD).reply(PromptKind::RepairCode, CODE);
        }
        let service = Arc::new(service);
        let gateway = gateway(&service);
        let renderer = QueuedRenderer::new(Vec::new());
        let generation = GenerationLoop::new(&gateway, &renderer, &store, "rules", 3, ResetController::new(0));

        let mut state = new_state();
        let end = generation.run(&mut state, &ProgressReporter::new()).await.unwrap();

        assert_eq!(
            end,
            GenerationEnd::Exhausted {
                stage: Stage::CodeValidation,
                reason: "ShowCreation was removed".to_string(),
            }
        );
        assert_eq!(state.repair_attempts, 3);
        assert_eq!(state.generation_cycles, 4);
        assert_eq!(state.history.entries(FailureChannel::Validation).len(), 4);
        assert!(renderer.scenes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_uses_fresh_artifact() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let mut service = ScriptedService::new();
        for _ in 0..2 {
            service = service.reply(PromptKind::GenerateCode, CODE);
        }
        for _ in 0..5 {
            service = service.reply(PromptKind::CheckCode, GOOD).reply(PromptKind::RepairCode, CODE);
        }
        let service = Arc::new(service);
        let gateway = gateway(&service);
        let renderer = QueuedRenderer::new((0..4).map(|i| render_failure(&format!("err {}", i))).collect());
        let generation = GenerationLoop::new(&gateway, &renderer, &store, "rules", 3, ResetController::new(1));

        let mut state = new_state();
        let end = generation.run(&mut state, &ProgressReporter::new()).await.unwrap();

        assert_eq!(end, GenerationEnd::Rendered);
        assert_eq!(state.reset_count, 1);
        assert_eq!(state.repair_attempts, 0);
        let scenes = renderer.scenes.lock().unwrap();
        assert_eq!(scenes.len(), 5);
        assert!(scenes[..4].iter().all(|s| s == &scenes[0]));
        assert_ne!(scenes[4], scenes[0]);
        // The regeneration after the reset sees the earlier render failures
        let generations = service.calls(PromptKind::GenerateCode);
        assert!(generations[1].user.contains("err 3"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let service = Arc::new(ScriptedService::new().reply(PromptKind::GenerateCode, CODE));
        let gateway = gateway(&service);
        let renderer = QueuedRenderer::new(Vec::new());
        let generation = GenerationLoop::new(&gateway, &renderer, &store, "rules", 3, ResetController::new(1));

        let mut state = new_state();
        // No CheckCode reply scripted
        let err = generation.run(&mut state, &ProgressReporter::new()).await.unwrap_err();
        assert!(matches!(err, crate::error::SceneForgeError::Llm(_)));
        assert_eq!(state.repair_attempts, 0);
        assert!(state.generated_code.is_some());
    }
}
