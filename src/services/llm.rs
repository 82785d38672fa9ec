use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Sends a single-turn prompt to a chat model.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionService for GroqClient {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let start = Instant::now();
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            top_p: options.top_p,
            stream: false,
        };

        debug!(model = model, prompt_length = prompt.len(), "Sending completion request");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;

        if !status.is_success() {
            let message = api_error_message(&payload);
            warn!(model = model, status = status.as_u16(), error = %message, "LLM API returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = parse_completion(&payload)?;
        info!(
            model = model,
            response_length = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );

        Ok(Completion {
            text,
            model: model.to_string(),
        })
    }
}

/// First choice's content; an empty string when the provider returned no choices.
fn parse_completion(payload: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(payload).map_err(|e| LlmError::Malformed(e.to_string()))?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default())
}

fn api_error_message(payload: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(payload) {
        Ok(envelope) => envelope.error.message,
        Err(_) if payload.trim().is_empty() => "Unknown API error".to_string(),
        Err(_) => payload.trim().to_string(),
    }
}
