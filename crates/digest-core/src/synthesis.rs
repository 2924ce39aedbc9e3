use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{SynthesisError, SynthesisErrorKind};
use crate::prompt::render_prompt;

const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Turns a prompt template plus serialized context into narrative text
#[async_trait]
pub trait SynthesisInvoker: Send + Sync {
    async fn synthesize(
        &self,
        prompt_template: &str,
        context_text: &str,
    ) -> Result<String, SynthesisError>;
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<Content>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

pub struct AnthropicSynthesizer {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_attempts: u32,
}

impl AnthropicSynthesizer {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
            max_tokens: 4096,
            max_attempts: 3,
        })
    }

    pub fn with_limits(mut self, max_tokens: u32, max_attempts: u32) -> Self {
        self.max_tokens = max_tokens;
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn try_synthesize(&self, prompt: &str) -> Result<String, SynthesisError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(SynthesisError::from_status(status, &body));
        }

        parse_claude_response(&body)
    }
}

fn parse_claude_response(body: &str) -> Result<String, SynthesisError> {
    let claude_response: ClaudeResponse = serde_json::from_str(body).map_err(|e| {
        SynthesisError::new(
            SynthesisErrorKind::Transport,
            format!("Failed to parse Claude API response: {}", e),
        )
    })?;

    if claude_response.stop_reason.as_deref() == Some("refusal") {
        return Err(SynthesisError::new(
            SynthesisErrorKind::ContentFilter,
            "model declined to answer",
        ));
    }

    let text = claude_response
        .content
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    non_empty(text)
}

#[async_trait]
impl SynthesisInvoker for AnthropicSynthesizer {
    async fn synthesize(
        &self,
        prompt_template: &str,
        context_text: &str,
    ) -> Result<String, SynthesisError> {
        let prompt = render_prompt(prompt_template, context_text);
        with_retries(self.max_attempts, || self.try_synthesize(&prompt)).await
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

/// Google Gemini `generateContent` client
pub struct GeminiSynthesizer {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_attempts: u32,
}

impl GeminiSynthesizer {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
            max_tokens: 4096,
            max_attempts: 3,
        })
    }

    pub fn with_limits(mut self, max_tokens: u32, max_attempts: u32) -> Self {
        self.max_tokens = max_tokens;
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn try_synthesize(&self, prompt: &str) -> Result<String, SynthesisError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(SynthesisError::from_status(status, &body));
        }

        parse_gemini_response(&body)
    }
}

fn parse_gemini_response(body: &str) -> Result<String, SynthesisError> {
    let gemini_response: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        SynthesisError::new(
            SynthesisErrorKind::Transport,
            format!("Failed to parse Gemini API response: {}", e),
        )
    })?;

    if let Some(reason) = gemini_response
        .prompt_feedback
        .and_then(|f| f.block_reason)
    {
        return Err(SynthesisError::new(
            SynthesisErrorKind::ContentFilter,
            format!("prompt blocked: {}", reason),
        ));
    }

    let candidate = gemini_response.candidates.into_iter().next().ok_or_else(|| {
        SynthesisError::new(SynthesisErrorKind::Transport, "response had no candidates")
    })?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if matches!(reason, "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII") {
            return Err(SynthesisError::new(
                SynthesisErrorKind::ContentFilter,
                format!("generation stopped: {}", reason),
            ));
        }
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    non_empty(text)
}

#[async_trait]
impl SynthesisInvoker for GeminiSynthesizer {
    async fn synthesize(
        &self,
        prompt_template: &str,
        context_text: &str,
    ) -> Result<String, SynthesisError> {
        let prompt = render_prompt(prompt_template, context_text);
        with_retries(self.max_attempts, || self.try_synthesize(&prompt)).await
    }
}

fn non_empty(text: String) -> Result<String, SynthesisError> {
    if text.trim().is_empty() {
        Err(SynthesisError::new(
            SynthesisErrorKind::Transport,
            "model returned an empty completion",
        ))
    } else {
        Ok(text)
    }
}

/// Retry timeouts and rate limits with backoff; other errors return at once
async fn with_retries<F, Fut>(max_attempts: u32, mut call: F) -> Result<String, SynthesisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, SynthesisError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(text) => return Ok(text),
            Err(e) if !e.kind.is_retryable() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                let backoff = backoff_for(e.kind, attempt);
                tracing::warn!(
                    attempt,
                    kind = %e.kind,
                    backoff_ms = backoff.as_millis() as u64,
                    "synthesis attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Delay before the next attempt, capped at `MAX_BACKOFF`
fn backoff_for(kind: SynthesisErrorKind, attempt: u32) -> Duration {
    // Longer backoff for rate limits
    let secs = if kind == SynthesisErrorKind::RateLimit {
        15_u64.saturating_mul(u64::from(attempt))
    } else {
        2_u64.saturating_pow(attempt.saturating_sub(1))
    };
    Duration::from_secs(secs).min(MAX_BACKOFF)
}
