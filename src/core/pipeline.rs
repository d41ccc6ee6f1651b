// Core orchestration - one run from request to published render

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::artifact::{ArtifactStore, RenderedOutput};
use crate::core::description::DescriptionLoop;
use crate::core::feasibility;
use crate::core::generation::{GenerationEnd, GenerationLoop, GenerationState};
use crate::core::llm::{CompletionGateway, CompletionService};
use crate::core::progress::ProgressReporter;
use crate::core::publish::{LocalPublisher, Published, Publisher};
use crate::core::renderer::{ProcessRenderer, Renderer};
use crate::core::reset::ResetController;
use crate::core::rules::RuleBook;
use crate::error::{PublishError, SceneForgeError};
use crate::models::{
    Config, DescriptionState, FailureKind, FeasibilityResult, LimitsConfig, PipelineOutcome,
    PipelineRequest, RenderFailure, RenderSuccess, RunCounters, Stage,
};

/// Orchestrates feasibility, description, generation and publishing
///
/// A pipeline holds no per-run state, so one instance can serve many
/// concurrent runs.
pub struct Pipeline {
    gateway: CompletionGateway,
    renderer: Arc<dyn Renderer>,
    publisher: Arc<dyn Publisher>,
    store: ArtifactStore,
    output: RenderedOutput,
    rules: RuleBook,
    limits: LimitsConfig,
    keep_artifacts: bool,
}

/// Why a run stopped before reaching its own terminal outcome
enum Interruption {
    TimedOut(u64),
    Cancelled,
}

/// Everything a run has produced so far, kept outside the run future so it
/// survives a timeout or cancellation
#[derive(Default)]
struct RunContext {
    feasibility: Option<FeasibilityResult>,
    description: Option<DescriptionState>,
    generation: Option<GenerationState>,
}

impl RunContext {
    fn counters(&self) -> RunCounters {
        let mut counters = self
            .generation
            .as_ref()
            .map(GenerationState::counters)
            .unwrap_or_default();
        counters.refinement_count = self
            .description
            .as_ref()
            .map(|d| d.refinement_count)
            .unwrap_or(0);
        counters
    }

    fn description_text(&self) -> Option<String> {
        self.description
            .as_ref()
            .map(|d| d.current_description.clone())
            .filter(|d| !d.is_empty())
    }

    /// Failure carrying every piece of partial context
    fn failure(&self, run_id: &str, request: &PipelineRequest, kind: FailureKind, stage: Stage, reason: String) -> PipelineOutcome {
        let mut failure = RenderFailure::new(run_id, kind, stage, reason);
        failure.chat_label = self
            .feasibility
            .as_ref()
            .map(|f| f.chat_label.clone())
            .filter(|l| !l.is_empty());
        failure.description = self.description_text();
        failure.generated_code = self.generation.as_ref().and_then(|g| g.generated_code.clone());
        failure.conversation_id = request.prior_conversation_id.clone();
        failure.counters = self.counters();
        PipelineOutcome::Failure(failure)
    }
}

impl Pipeline {
    pub fn new(
        gateway: CompletionGateway,
        renderer: Arc<dyn Renderer>,
        publisher: Arc<dyn Publisher>,
        store: ArtifactStore,
        output: RenderedOutput,
        rules: RuleBook,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            gateway,
            renderer,
            publisher,
            store,
            output,
            rules,
            limits,
            keep_artifacts: false,
        }
    }

    /// Keep staged source files after a terminal outcome
    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Build a pipeline with the process renderer and local publisher
    ///
    /// `config` paths must already be resolved against the project root.
    pub fn from_config(
        config: &Config,
        service: Arc<dyn CompletionService>,
        project_root: &Path,
    ) -> Result<Self, SceneForgeError> {
        let rules = RuleBook::load(&config.output.rules_dir)?;
        let gateway = CompletionGateway::new(service, Duration::from_secs(config.llm.timeout_seconds));
        let renderer = ProcessRenderer::new(
            config.render.clone(),
            project_root,
            config.behavior.stream_output,
        );

        Ok(Self::new(
            gateway,
            Arc::new(renderer),
            Arc::new(LocalPublisher::new(&config.output.dir)),
            ArtifactStore::new(&config.render.staging_dir),
            RenderedOutput::new(&config.render.media_dir, config.render.version_suffix.clone()),
            rules,
            config.limits.clone(),
        )
        .keep_artifacts(config.behavior.keep_artifacts))
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Entry point taking the loosely-typed request fields
    ///
    /// Invalid fields end the run with a failure at the initializing stage.
    pub async fn run_query(
        &self,
        query: &str,
        quality: &str,
        format: &str,
        resolution: &str,
        prior_conversation_id: Option<String>,
        reporter: &ProgressReporter,
    ) -> PipelineOutcome {
        match PipelineRequest::parse(query, quality, format, resolution, prior_conversation_id.clone()) {
            Ok(request) => self.run(request, reporter).await,
            Err(e) => {
                warn!("Rejected request: {}", e);
                reporter.started(query);
                let mut failure =
                    RenderFailure::new(reporter.run_id(), FailureKind::Fatal, Stage::Initializing, e.to_string());
                failure.conversation_id = prior_conversation_id;
                let outcome = PipelineOutcome::Failure(failure);
                reporter.finish(&outcome);
                outcome
            }
        }
    }

    /// Run one request to a terminal outcome
    pub async fn run(&self, request: PipelineRequest, reporter: &ProgressReporter) -> PipelineOutcome {
        self.run_until(request, reporter, std::future::pending::<()>()).await
    }

    /// Run one request, stopping early when `cancel` resolves
    ///
    /// A cancelled run kills the renderer, removes the staged source and still
    /// reports everything produced before the cancellation.
    pub async fn run_until<C>(&self, request: PipelineRequest, reporter: &ProgressReporter, cancel: C) -> PipelineOutcome
    where
        C: Future<Output = ()>,
    {
        info!("Starting run {}: {}", reporter.run_id(), request.query);
        reporter.started(&request.query);
        reporter.report(Stage::Initializing, None);

        let mut ctx = RunContext::default();
        let finished = {
            let execution = self.execute_within_budget(&request, reporter, &mut ctx);
            tokio::select! {
                finished = execution => finished,
                _ = cancel => Err(Interruption::Cancelled),
            }
        };

        let outcome = match finished {
            Ok(outcome) => outcome,
            Err(interruption) => {
                let stage = reporter.current_stage();
                let (kind, reason) = match interruption {
                    Interruption::TimedOut(secs) => {
                        error!("Run {} timed out after {}s during {}", reporter.run_id(), secs, stage);
                        (
                            FailureKind::TimedOut,
                            format!("run timed out after {} seconds during {}", secs, stage.label()),
                        )
                    }
                    Interruption::Cancelled => {
                        warn!("Run {} cancelled during {}", reporter.run_id(), stage);
                        (FailureKind::Cancelled, format!("cancelled by user during {}", stage.label()))
                    }
                };
                ctx.failure(reporter.run_id(), &request, kind, stage, reason)
            }
        };

        if self.keep_artifacts {
            if let Some(artifact) = ctx.generation.as_mut().and_then(GenerationState::artifact_mut) {
                info!("Keeping staged source {}", artifact.path().display());
                artifact.keep();
            }
        }

        match &outcome {
            PipelineOutcome::Success(s) => info!("Run {} succeeded: {}", s.run_id, s.link),
            PipelineOutcome::Failure(f) => warn!(
                "Run {} failed at {}: {}",
                f.run_id,
                f.failed_stage,
                f.reason.lines().last().unwrap_or_default()
            ),
        }
        reporter.finish(&outcome);
        outcome
    }

    /// `execute` under the optional run-level wall-clock budget
    async fn execute_within_budget(
        &self,
        request: &PipelineRequest,
        reporter: &ProgressReporter,
        ctx: &mut RunContext,
    ) -> Result<PipelineOutcome, Interruption> {
        match self.limits.run_timeout_seconds {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.execute(request, reporter, ctx))
                .await
                .map_err(|_| Interruption::TimedOut(secs)),
            None => Ok(self.execute(request, reporter, ctx).await),
        }
    }

    async fn execute(&self, request: &PipelineRequest, reporter: &ProgressReporter, ctx: &mut RunContext) -> PipelineOutcome {
        let run_id = reporter.run_id();

        // Feasibility: checked exactly once
        reporter.report(Stage::Feasibility, Some("checking feasibility".to_string()));
        let verdict = match feasibility::classify(&self.gateway, &request.query).await {
            Ok(verdict) => verdict,
            Err(e) => {
                return ctx.failure(run_id, request, FailureKind::Fatal, Stage::Feasibility, e.to_string());
            }
        };
        let category = verdict.category;
        let feasible = verdict.is_feasible;
        let reason = verdict.reason.clone();
        ctx.feasibility = Some(verdict);
        if !feasible {
            let reason = if reason.is_empty() {
                "the request cannot be produced as an animation".to_string()
            } else {
                reason
            };
            return ctx.failure(run_id, request, FailureKind::Infeasible, Stage::Feasibility, reason);
        }

        // Description
        let description = ctx
            .description
            .insert(DescriptionState::new(request.query.clone(), category));
        if let Err(e) = DescriptionLoop::new(&self.gateway, self.limits.max_refinements)
            .run(description, reporter)
            .await
        {
            return ctx.failure(run_id, request, FailureKind::Fatal, Stage::Description, e.to_string());
        }
        let description_text = description.current_description.clone();

        // Code generation, repair and reset
        let generation = ctx
            .generation
            .insert(GenerationState::new(description_text, category, request));
        let end = GenerationLoop::new(
            &self.gateway,
            self.renderer.as_ref(),
            &self.store,
            self.rules.rules_for(category),
            self.limits.max_repairs,
            ResetController::new(self.limits.max_resets),
        )
        .run(generation, reporter)
        .await;

        match end {
            Ok(GenerationEnd::Rendered) => {}
            Ok(GenerationEnd::Exhausted { stage, reason }) => {
                return ctx.failure(run_id, request, FailureKind::Exhausted, stage, reason);
            }
            Err(e) => {
                let stage = reporter.current_stage();
                return ctx.failure(run_id, request, FailureKind::Fatal, stage, e.to_string());
            }
        }

        // Publish
        reporter.report(Stage::Publish, Some("publishing render".to_string()));
        match self.publish(request, ctx).await {
            Ok(Published { location, link }) => {
                let counters = ctx.counters();
                let feasibility = ctx.feasibility.as_ref();
                PipelineOutcome::Success(RenderSuccess {
                    run_id: run_id.to_string(),
                    artifact_location: location,
                    link,
                    generated_code: ctx
                        .generation
                        .as_ref()
                        .and_then(|g| g.generated_code.clone())
                        .unwrap_or_default(),
                    description: ctx.description_text().unwrap_or_default(),
                    quality: request.quality,
                    chat_label: feasibility.map(|f| f.chat_label.clone()).unwrap_or_default(),
                    category,
                    conversation_id: request.prior_conversation_id.clone(),
                    counters,
                })
            }
            Err(e) => ctx.failure(run_id, request, FailureKind::Fatal, Stage::Publish, e.to_string()),
        }
    }

    /// Hand the rendered file to the publisher, then remove the renderer's copies
    async fn publish(&self, request: &PipelineRequest, ctx: &RunContext) -> Result<Published, PublishError> {
        let stem = ctx
            .generation
            .as_ref()
            .and_then(GenerationState::scene_name)
            .ok_or_else(|| PublishError::OutputNotFound("no staged scene".to_string()))?;
        let extension = request.format.extension();

        let rendered = self
            .output
            .locate(stem, extension)
            .ok_or_else(|| PublishError::OutputNotFound(format!("{}.{}", stem, extension)))?;

        let published = self.publisher.publish(&rendered, stem).await?;
        let removed = self.output.cleanup(stem, extension);
        info!("Published via {} ({} rendered path(s) cleaned up)", self.publisher.name(), removed);
        Ok(published)
    }
}
