/// LLM Client: the single point of entry for all Claude API calls in the critique service.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module, via the `StructuredGenerator` trait.
///
/// Retries are NOT done here. Each call is a single attempt whose failure is classified
/// into a `CallErrorKind`; the analysis invoker owns timeout, retry and backoff.
///
/// Model: claude-sonnet-4-5 (hardcoded, not configurable)
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod prompts;

use prompts::JSON_ONLY_SYSTEM;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in the critique service.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
/// Upper bound on a single HTTP exchange. The invoker's per-attempt timeout is tighter.
const HTTP_TIMEOUT_SECS: u64 = 120;

/// Classification of a failed external call. Drives the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    RateLimited,
    Overloaded,
    Timeout,
    Invalid,
    Unknown,
}

impl CallErrorKind {
    /// Rate limits, overload and timeouts are transient; everything else fails fast.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            CallErrorKind::RateLimited | CallErrorKind::Overloaded | CallErrorKind::Timeout
        )
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct CallError {
    pub kind: CallErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Maps an HTTP status from the model API onto the call taxonomy.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let kind = match status.as_u16() {
            429 => CallErrorKind::RateLimited,
            408 | 504 => CallErrorKind::Timeout,
            // 529 is Anthropic's "overloaded"
            500 | 502 | 503 | 529 => CallErrorKind::Overloaded,
            400 | 401 | 403 | 404 | 413 | 422 => CallErrorKind::Invalid,
            s if (500..600).contains(&s) => CallErrorKind::Overloaded,
            _ => CallErrorKind::Unknown,
        };
        Self::new(kind, message)
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            CallErrorKind::Timeout
        } else if e.is_connect() {
            CallErrorKind::Overloaded
        } else if e.is_decode() {
            CallErrorKind::Invalid
        } else {
            CallErrorKind::Unknown
        };
        CallError::new(kind, e.to_string())
    }
}

/// Describes the JSON shape a structured-generation call must return.
///
/// `shape` is a JSON skeleton shown to the model. It is a hint, not a guarantee: callers
/// validate the returned value themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub shape: &'static str,
}

/// The structured-generation capability consumed by the analysis core.
///
/// Implementations return whatever JSON the model produced. When the model output is not
/// JSON at all, the raw text is returned as `Value::String` so schema validation can ask
/// for a repair instead of treating it as a transport failure.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value, CallError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by the critique service.
/// Wraps the Anthropic Messages API and implements `StructuredGenerator`.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, CallError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, api_key })
    }

    /// Makes a single raw call to the Claude API, returning the full response object.
    /// Non-success statuses are classified, never retried here.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, CallError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CallError::from_status(status, message));
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl StructuredGenerator for LlmClient {
    async fn generate(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value, CallError> {
        let full_prompt = with_schema(prompt, schema);
        let response = self.call(&full_prompt, JSON_ONLY_SYSTEM).await?;

        let text = response
            .text()
            .ok_or_else(|| CallError::new(CallErrorKind::Unknown, "LLM returned empty content"))?;

        Ok(parse_model_json(text))
    }
}

/// Appends the schema skeleton to a prompt.
fn with_schema(prompt: &str, schema: &SchemaDescriptor) -> String {
    format!(
        "{prompt}\n\nReturn a JSON object with this EXACT schema (no extra fields):\n{}",
        schema.shape
    )
}

/// Parses model text as JSON, falling back to the raw text as a JSON string.
fn parse_model_json(text: &str) -> Value {
    let stripped = strip_json_fences(text);
    serde_json::from_str(stripped).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
