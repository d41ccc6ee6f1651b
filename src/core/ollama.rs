use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::llm::{CompletionRequest, CompletionService};
use crate::error::LlmError;
use crate::models::LlmConfig;

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
    stream_to_stdout: bool,
}

/// Chat message for Ollama chat API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Request body for Ollama chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

/// Response from Ollama chat endpoint (streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessageResponse>,
    done: bool,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Message content in chat response; the role is always "assistant" and is skipped
#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration
    pub fn new(config: LlmConfig, stream_to_stdout: bool) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config, stream_to_stdout })
    }

    /// Model used for a request kind
    fn model_for(&self, request: &CompletionRequest) -> &str {
        if request.kind.uses_fast_model() {
            self.config.fast_model()
        } else {
            &self.config.model
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(ChatMessage::system(request.system.as_str()));
        }
        messages.push(ChatMessage::user(request.user.as_str()));

        ChatRequest {
            model: self.model_for(request).to_string(),
            messages,
            stream: true,
            format: request.kind.expects_json().then_some("json"),
        }
    }

    /// Send a chat request and collect the streamed response
    ///
    /// Generated code is echoed to stdout when streaming is enabled; verdicts are not.
    async fn chat(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.config.url);
        let body = self.build_request(request);
        let echo = self.stream_to_stdout && !request.kind.expects_json();

        debug!("Sending {} chat request to Ollama: {} (model: {})", request.kind, url, body.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ConnectionRefused(format!(
                        "Could not connect to Ollama at {}. Is Ollama running?",
                        self.config.url
                    ))
                } else if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_seconds)
                } else {
                    LlmError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpError { status, message });
        }

        let mut full_response = String::new();
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut generation_done = false;
        let mut token_count = 0usize;
        let mut last_progress_log = std::time::Instant::now();
        let progress_interval = Duration::from_secs(10);

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| LlmError::StreamError(e.to_string()))?;

            // Ollama sends newline-delimited JSON
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let parsed: ChatResponse = match serde_json::from_str(line) {
                    Ok(p) => p,
                    Err(e) => {
                        if !full_response.is_empty() {
                            debug!("Ignoring parse error on final chunk: {}", e);
                            continue;
                        }
                        let shown: String = line.chars().take(200).collect();
                        return Err(LlmError::ParseError(format!("Failed to parse: {} - {}", shown, e)));
                    }
                };

                let content = parsed.message.as_ref().map(|m| m.content.as_str()).unwrap_or("");
                full_response.push_str(content);
                token_count += 1;

                if echo {
                    print!("{}", content);
                    io::stdout().flush().ok();
                } else if last_progress_log.elapsed() > progress_interval {
                    info!(
                        "Generation in progress: {} tokens, {} chars so far...",
                        token_count,
                        full_response.len()
                    );
                    last_progress_log = std::time::Instant::now();
                }

                if parsed.done {
                    generation_done = true;
                    if echo {
                        println!();
                    }
                    if let Some(duration) = parsed.total_duration {
                        debug!("Generation completed in {}ms", duration / 1_000_000);
                    }
                    if let Some(count) = parsed.eval_count {
                        debug!("Tokens generated: {}", count);
                    }
                    break;
                }
            }

            if generation_done {
                break;
            }
        }

        debug!("{} response: {} characters", request.kind, full_response.len());
        Ok(full_response)
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool, LlmError> {
        let url = format!("{}/api/tags", self.config.url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ConnectionRefused(format!(
                        "Could not connect to Ollama at {}",
                        self.config.url
                    ))
                } else {
                    LlmError::from(e)
                }
            })?;

        Ok(response.status().is_success())
    }

    /// Check if a model is available on the server
    pub async fn check_model(&self, model_name: &str) -> Result<bool, LlmError> {
        let url = format!("{}/api/tags", self.config.url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Ok(false);
        }

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }

        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let found = tags.models.iter().any(|m| {
            m.name == model_name || m.name.starts_with(&format!("{}:", model_name))
        });

        if !found {
            warn!(
                "Model '{}' not found. Available models: {:?}",
                model_name,
                tags.models.iter().map(|m| &m.name).collect::<Vec<_>>()
            );
        }

        Ok(found)
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.chat(request).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
