use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use dialoguer::{theme::ColorfulTheme, Input};

use crate::core::{
    load_config, require_project, OllamaClient, Pipeline, ProgressReporter, RunStatusManager,
    StatusSink, TracingSink,
};
use crate::error::SceneForgeError;
use crate::models::{FailureKind, PipelineOutcome, PipelineRequest};

/// Render options
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Animation request; prompted for when absent
    pub query: Option<String>,
    /// Quality tier code (ql, qm, qh, qp, qk)
    pub quality: String,
    /// Output format (mp4, mov, webm, gif, png)
    pub format: String,
    /// Output resolution, WIDTHxHEIGHT
    pub resolution: String,
    /// Prior conversation this request continues
    pub conversation: Option<String>,
    /// Print the outcome as JSON
    pub json: bool,
    /// Model override
    pub model: Option<String>,
    /// URL override
    pub url: Option<String>,
    /// Timeout override
    pub timeout: Option<u64>,
    /// Disable streaming output
    pub no_stream: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            query: None,
            quality: "ql".to_string(),
            format: "mp4".to_string(),
            resolution: "1920x1080".to_string(),
            conversation: None,
            json: false,
            model: None,
            url: None,
            timeout: None,
            no_stream: false,
        }
    }
}

/// Run one request through the pipeline
///
/// Returns whether the run produced a render.
pub async fn render_animation(project_root: &Path, options: RenderOptions) -> Result<bool, SceneForgeError> {
    require_project(project_root)?;

    // JSON output must not be interleaved with streamed tokens
    let no_stream = options.no_stream || options.json;
    let config = load_config(project_root, options.model, options.url, options.timeout, no_stream)?;

    let query = match options.query {
        Some(q) => q,
        None => prompt_for_query()?,
    };
    let request = PipelineRequest::parse(
        &query,
        &options.quality,
        &options.format,
        &options.resolution,
        options.conversation,
    )?;

    let ollama = OllamaClient::new(config.llm.clone(), config.behavior.stream_output)?;
    match ollama.health_check().await {
        Ok(true) => info!("Ollama is ready"),
        Ok(false) => warn!("Ollama may not be fully ready"),
        Err(e) => {
            error!("Cannot connect to Ollama: {}", e);
            return Err(SceneForgeError::Llm(e));
        }
    }

    let pipeline = Pipeline::from_config(&config, Arc::new(ollama), project_root)?;
    let status = RunStatusManager::new_shared(project_root)?;
    let reporter = ProgressReporter::new()
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(StatusSink::new(status)));

    // Ctrl-C ends the run as cancelled
    let cancel = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        warn!("Interrupted, cancelling run {}", reporter.run_id());
    };
    let outcome = pipeline.run_until(request, &reporter, cancel).await;

    if options.json {
        let json = serde_json::to_string_pretty(&outcome).map_err(std::io::Error::from)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    Ok(outcome.is_success())
}

/// Ask for a request interactively
fn prompt_for_query() -> Result<String, SceneForgeError> {
    let query: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Describe the animation")
        .interact_text()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(query)
}

/// Print the outcome summary
pub fn print_outcome(outcome: &PipelineOutcome) {
    println!("\n=== SceneForge Result ===\n");
    println!("{}", outcome);

    if let PipelineOutcome::Failure(failure) = outcome {
        match failure.kind {
            FailureKind::Infeasible => {
                println!("\nTry rephrasing the request as something that can be drawn or plotted.");
            }
            FailureKind::Exhausted => {
                println!(
                    "\nGave up after {} code generation cycle(s) and {} reset(s).",
                    failure.counters.generation_cycles, failure.counters.reset_count
                );
                if failure.generated_code.is_some() {
                    println!("Use --json to see the last generated code.");
                }
            }
            FailureKind::TimedOut => {
                println!("\nRaise limits.run_timeout_seconds in the config to allow longer runs.");
            }
            FailureKind::Cancelled | FailureKind::Fatal => {}
        }
    }
}
