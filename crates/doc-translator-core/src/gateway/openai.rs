use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{GatewayInfo, Instruction, TextTransform};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// OpenAI-compatible chat-completion gateway
/// Works with: OpenAI, llama.cpp server, Ollama, DeepSeek, etc.
pub struct OpenAiGateway {
    client: Client,
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGateway {
    /// Create a gateway from configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GatewayRequest(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    async fn complete(&self, system: &str, text: &str) -> Result<String> {
        let url = self.endpoint();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            warn!("Request to {url} failed: {e}");
            if e.is_timeout() {
                Error::GatewayTimeout
            } else {
                Error::GatewayRequest(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("API error: {status} - {body}");

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::GatewayAuth(format!("HTTP {status}: {body}"))
                }
                StatusCode::TOO_MANY_REQUESTS => Error::GatewayRateLimited { retry_after },
                _ => Error::GatewayRequest(format!("HTTP {status}: {body}")),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse response: {e}");
            if e.is_timeout() {
                Error::GatewayTimeout
            } else {
                Error::GatewayInvalidResponse(e.to_string())
            }
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::GatewayInvalidResponse("no choices in response".to_string()))?
            .message
            .content
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::GatewayInvalidResponse("empty completion".to_string()));
        }
        Ok(content)
    }
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextTransform for OpenAiGateway {
    fn info(&self) -> GatewayInfo {
        GatewayInfo {
            name: "OpenAI Compatible",
            model: self.model.clone(),
        }
    }

    async fn transform(&self, text: &str, instruction: &Instruction) -> Result<String> {
        debug!(
            "{} request ({} chars) to {} with {}",
            instruction.kind(),
            text.chars().count(),
            self.endpoint(),
            self.model
        );
        self.complete(&instruction.system_prompt(), text).await
    }
}
