//! Inference: build the analysis request and call the model.
//!
//! This module truncates the extracted text, wraps it in the fixed prompt
//! from [`crate::prompts`], and issues exactly one completion call. There is
//! no retry, no streaming and no partial-result handling: the call either
//! returns a non-empty response or the run fails with
//! [`AnalyzerError::AnalysisFailed`].
//!
//! The remote service sits behind the [`LlmProvider`] trait.
//! [`AnthropicProvider`] speaks the Anthropic Messages API; tests and
//! embedding applications can inject their own implementation through
//! [`crate::config::AnalysisConfig::provider`].

use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::prompts::analysis_prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest slice of an error body quoted back to the user.
const ERROR_BODY_SNIPPET: usize = 300;

// ── Request / response types ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The single request a run sends. Serialises to the Messages API body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

/// A completed model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    /// Concatenated text of all text content blocks.
    pub content: String,
    /// Model that actually served the request.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// `end_turn`, `max_tokens`, … when the service reports one.
    pub stop_reason: Option<String>,
}

/// A remote inference service.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Issue one completion call.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, AnalyzerError>;
}

// ── Anthropic Messages API ───────────────────────────────────────────────

/// [`LlmProvider`] for the Anthropic Messages API (`POST /v1/messages`).
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    version: String,
    timeout_secs: u64,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        version: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalyzerError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            version: version.into(),
            timeout_secs,
        })
    }

    /// Build a provider from the run configuration.
    ///
    /// Fails with [`AnalyzerError::MissingApiKey`] when no usable key is set.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalyzerError> {
        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(AnalyzerError::MissingApiKey)?;
        Self::new(
            key,
            config.api_base_url.as_str(),
            config.anthropic_version.as_str(),
            config.api_timeout_secs,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, AnalyzerError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AnalyzerError::AnalysisFailed {
                reason: if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout_secs)
                } else {
                    format!("HTTP request failed: {e}")
                },
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalyzerError::AnalysisFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AnalyzerError::AnalysisFailed {
                reason: describe_api_error(status.as_u16(), &body),
            });
        }

        parse_messages_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Parse a successful Messages API body into an [`LlmResponse`].
pub fn parse_messages_response(body: &str) -> Result<LlmResponse, AnalyzerError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|e| AnalyzerError::AnalysisFailed {
            reason: format!("malformed response: {e}"),
        })?;

    let content: String = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let (input_tokens, output_tokens) = parsed
        .usage
        .map(|u| (u.input_tokens, u.output_tokens))
        .unwrap_or((0, 0));

    Ok(LlmResponse {
        content,
        model: parsed.model,
        input_tokens,
        output_tokens,
        stop_reason: parsed.stop_reason,
    })
}

/// Human-readable description of a non-success API response.
pub fn describe_api_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) if !env.error.message.is_empty() => {
            format!("API error {status} ({}): {}", env.error.kind, env.error.message)
        }
        _ => {
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET).collect();
            format!("API error {status}: {}", snippet.trim())
        }
    }
}

// ── Analysis request ─────────────────────────────────────────────────────

/// Outcome of [`request_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub response: LlmResponse,
    /// Characters of paper text embedded in the prompt.
    pub submitted_chars: usize,
    /// Whether the paper text was cut at the ceiling.
    pub truncated: bool,
    pub duration_ms: u64,
}

/// Split `text` after at most `max_chars` characters (never inside a
/// multi-byte character). Returns the kept prefix and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Build the prompt for `paper_text` and run it through `provider`.
///
/// Truncation to `config.max_input_chars` is silent towards the caller; it
/// is only logged and reflected in [`AnalysisResponse::truncated`].
pub async fn request_analysis(
    provider: &dyn LlmProvider,
    paper_text: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisResponse, AnalyzerError> {
    let start = Instant::now();
    let (kept, truncated) = truncate_chars(paper_text, config.max_input_chars);
    let submitted_chars = kept.chars().count();
    if truncated {
        warn!(
            "Paper text truncated to the first {} characters",
            config.max_input_chars
        );
    }

    let request = CompletionRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        messages: vec![ChatMessage::user(analysis_prompt(kept))],
    };

    info!(
        "Requesting analysis from {} ({}, {} chars)",
        provider.name(),
        request.model,
        submitted_chars
    );

    let response = provider.complete(&request).await?;
    let duration = start.elapsed();

    if response.content.trim().is_empty() {
        return Err(AnalyzerError::AnalysisFailed {
            reason: format!("{} returned an empty response", provider.name()),
        });
    }

    if response.stop_reason.as_deref() == Some("max_tokens") {
        warn!(
            "Response hit the {}-token limit; trailing sections may be missing",
            config.max_tokens
        );
    }

    debug!(
        "Analysis: {} input tokens, {} output tokens, {:?}",
        response.input_tokens, response.output_tokens, duration
    );

    Ok(AnalysisResponse {
        response,
        submitted_chars,
        truncated,
        duration_ms: duration.as_millis() as u64,
    })
}
