//! Renderer seam and the child-process renderer.
//!
//! [`ProcessRenderer`] runs the configured program once per render, streams its
//! combined output line by line and kills it when the render budget runs out.
//! Output is decoded lossily; invalid bytes become replacement characters.

use async_trait::async_trait;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::models::{OutputFormat, QualityTier, RenderConfig, Resolution};

/// Markers that start the relevant part of a renderer failure
const ERROR_MARKERS: &[&str] = &["Traceback", "Error", "Exception"];

/// How long to wait for buffered output after the process is gone
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One render of a staged source file
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub source: PathBuf,
    pub scene_name: String,
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub quality: QualityTier,
}

/// Result of one render, folded into the generation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    /// Combined stdout and stderr; only a success marker is kept on success
    pub raw_output: String,
    pub extracted_error_fragment: Option<String>,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            raw_output: "render completed".to_string(),
            extracted_error_fragment: None,
            timed_out: false,
        }
    }

    /// Failed render; the fragment is extracted from the captured lines
    pub fn failure(lines: &[String]) -> Self {
        Self {
            succeeded: false,
            raw_output: lines.join("\n"),
            extracted_error_fragment: extract_error_fragment(lines),
            timed_out: false,
        }
    }

    pub fn timeout(lines: &[String], timeout_secs: u64) -> Self {
        Self {
            succeeded: false,
            raw_output: lines.join("\n"),
            extracted_error_fragment: Some(timeout_message(timeout_secs)),
            timed_out: true,
        }
    }

    /// Most specific error text available for a failed render
    pub fn error_text(&self) -> String {
        self.extracted_error_fragment
            .clone()
            .unwrap_or_else(|| "renderer exited with an error and produced no output".to_string())
    }
}

/// Error text recorded when a render exceeds its budget
pub fn timeout_message(timeout_secs: u64) -> String {
    format!(
        "render timed out after {} seconds. The scene is too expensive or never finishes \
         (for example a wait without a duration or an unbounded updater); simplify it.",
        timeout_secs
    )
}

/// Pick the part of a failed render's output worth feeding back
///
/// Returns everything from the first line containing an error or traceback
/// marker, else the last non-empty line.
pub fn extract_error_fragment(lines: &[String]) -> Option<String> {
    if let Some(start) = lines
        .iter()
        .position(|line| ERROR_MARKERS.iter().any(|m| line.contains(m)))
    {
        return Some(lines[start..].join("\n").trim().to_string());
    }
    lines
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
}

/// Receives renderer output lines as they arrive
pub type LineSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// External renderer seam
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render a staged file
    ///
    /// A non-zero exit or a timeout is an `ExecutionOutcome` with
    /// `succeeded == false`; `Err` is reserved for failures to run the renderer at all.
    async fn render(&self, job: &RenderJob, on_line: LineSink<'_>) -> Result<ExecutionOutcome, RenderError>;

    fn name(&self) -> &str;
}

/// Renderer that runs the configured program as a child process
pub struct ProcessRenderer {
    config: RenderConfig,
    working_dir: PathBuf,
    echo: bool,
}

impl ProcessRenderer {
    pub fn new(config: RenderConfig, working_dir: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            echo,
        }
    }

    /// Arguments for one render
    ///
    /// `[subcommand] <source> <scene> --format <fmt> -r <w>,<h> [extra...] -q<tier>`
    pub fn build_args(&self, job: &RenderJob) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(sub) = &self.config.subcommand {
            args.push(sub.clone());
        }
        args.push(job.source.display().to_string());
        args.push(job.scene_name.clone());
        args.push("--format".to_string());
        args.push(job.format.extension().to_string());
        args.push("-r".to_string());
        args.push(job.resolution.render_arg());
        args.extend(self.config.extra_args.iter().cloned());
        args.push(job.quality.flag());
        args
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Check that the renderer program can be started
    pub async fn check_available(&self) -> Result<String, RenderError> {
        let output = Command::new(&self.config.program)
            .arg("--version")
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }
}

/// Forward lines from one pipe into the shared channel
///
/// Lines are decoded lossily; a read error ends this pipe only.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\n', '\r'][..])
                    .to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Stopped reading renderer output: {}", e);
                break;
            }
        }
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    async fn render(&self, job: &RenderJob, on_line: LineSink<'_>) -> Result<ExecutionOutcome, RenderError> {
        let args = self.build_args(job);
        info!("Rendering {} ({} {})", job.scene_name, job.quality.code(), job.resolution);
        debug!("Render command: {} {}", self.config.program, args.join(" "));

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut captured: Vec<String> = Vec::new();
        let mut observe = |line: String| {
            debug!("render: {}", line);
            if self.echo {
                println!("{}", line);
                io::stdout().flush().ok();
            }
            on_line(&line);
            captured.push(line);
        };

        let deadline = tokio::time::sleep(self.timeout());
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                Some(line) = rx.recv() => observe(line),
                status = child.wait() => {
                    break Some(status.map_err(RenderError::Wait)?);
                }
                _ = &mut deadline => {
                    warn!(
                        "Render of {} exceeded {}s, killing renderer",
                        job.scene_name, self.config.timeout_seconds
                    );
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill renderer: {}", e);
                    }
                    break None;
                }
            }
        };

        // Readers finish once the pipes close; bound the wait in case a
        // grandchild still holds them open
        while let Ok(Some(line)) = tokio::time::timeout(DRAIN_TIMEOUT, rx.recv()).await {
            observe(line);
        }

        let outcome = match status {
            None => ExecutionOutcome::timeout(&captured, self.config.timeout_seconds),
            Some(status) if status.success() => {
                info!("Render of {} completed", job.scene_name);
                ExecutionOutcome::success()
            }
            Some(status) => {
                let outcome = ExecutionOutcome::failure(&captured);
                warn!(
                    "Render of {} failed ({}): {}",
                    job.scene_name,
                    status,
                    outcome.error_text().lines().last().unwrap_or_default()
                );
                outcome
            }
        };
        Ok(outcome)
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}
