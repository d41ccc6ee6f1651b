use std::path::PathBuf;
use thiserror::Error;

use crate::models::{ConfigError, RequestError};

/// Main error type for SceneForge
#[derive(Error, Debug)]
pub enum SceneForgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("Rule file error: {0}")]
    Rule(#[from] RuleError),

    #[error("Status file error: {0}")]
    Status(#[from] StatusError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Renderer error: {0}")]
    Render(#[from] RenderError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project not initialized: no {0} found (run 'sceneforge init')")]
    NotInitialized(PathBuf),
}

/// Errors related to rule file parsing
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rule file {0}: {1}")]
    ReadError(PathBuf, std::io::Error),

    #[error("Failed to parse frontmatter in {0}: {1}")]
    FrontmatterError(PathBuf, String),

    #[error("Unknown category '{1}' in {0}")]
    UnknownCategory(PathBuf, String),
}

/// Errors related to status file operations
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Failed to read status file {0}: {1}")]
    ReadError(PathBuf, std::io::Error),

    #[error("Failed to write status file {0}: {1}")]
    WriteError(PathBuf, std::io::Error),

    #[error("Failed to parse status file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Run not found in status file: {0}")]
    RunNotFound(String),
}

/// Errors from the LLM completion service
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Malformed {kind} response: {detail}")]
    MalformedOutput { kind: String, detail: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::ConnectionRefused(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

/// Errors from the renderer subprocess that are not repairable render failures
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read renderer output: {0}")]
    Output(std::io::Error),

    #[error("Failed to wait for renderer: {0}")]
    Wait(std::io::Error),

    #[error("Artifact error for {0}: {1}")]
    Artifact(PathBuf, std::io::Error),
}

/// Errors from the artifact handoff collaborator
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Rendered output not found for {0}")]
    OutputNotFound(String),

    #[error("Failed to copy {0} to {1}: {2}")]
    CopyFailed(PathBuf, PathBuf, std::io::Error),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, SceneForgeError>;
