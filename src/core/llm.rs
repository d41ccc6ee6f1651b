use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::parser::parse_structured;
use crate::error::LlmError;

/// The kind of completion being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Feasibility,
    Describe,
    ValidateDescription,
    RefineDescription,
    GenerateCode,
    CheckCode,
    RepairCode,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Feasibility => "feasibility",
            PromptKind::Describe => "describe",
            PromptKind::ValidateDescription => "validate_description",
            PromptKind::RefineDescription => "refine_description",
            PromptKind::GenerateCode => "generate_code",
            PromptKind::CheckCode => "check_code",
            PromptKind::RepairCode => "repair_code",
        }
    }

    /// Classification and review calls run on the fast model
    pub fn uses_fast_model(&self) -> bool {
        matches!(
            self,
            PromptKind::Feasibility | PromptKind::ValidateDescription | PromptKind::CheckCode
        )
    }

    /// Whether the response must be a JSON object
    pub fn expects_json(&self) -> bool {
        !matches!(self, PromptKind::GenerateCode | PromptKind::RepairCode)
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completion call: system instruction plus user content
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(kind: PromptKind, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            user: user.into(),
        }
    }
}

/// LLM completion service seam
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Return the raw completion text for a request
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

/// Completion service with a per-call budget and structured decoding
#[derive(Clone)]
pub struct CompletionGateway {
    service: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl CompletionGateway {
    pub fn new(service: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Request free text (code generation and repair)
    pub async fn text(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            "LLM call {} via {} ({} chars of user content)",
            request.kind,
            self.service.name(),
            request.user.len()
        );
        match tokio::time::timeout(self.timeout, self.service.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Request a structured verdict of shape `T`
    pub async fn structured<T: DeserializeOwned>(
        &self,
        request: &CompletionRequest,
    ) -> Result<T, LlmError> {
        let response = self.text(request).await?;
        parse_structured(request.kind.as_str(), &response)
    }
}
