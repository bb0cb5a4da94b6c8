//! Chat-completion client and usage accounting.
//!
//! The wire contract is the OpenAI-style `/chat/completions` shape: request
//! `{model, messages, temperature, response_format?}`, response
//! `choices[0].message.content` plus token usage. Everything above this module
//! talks to the [`ChatApi`] trait, so tests inject a scripted client and the
//! resumable completion layer never knows whether a real network was involved.

use crate::error::Pdf2CardsError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

// ── Request types ────────────────────────────────────────────────────────

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response-format hint. Only `json_object` is ever requested.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// A chat-completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// A single-user-message request, the common case in this pipeline.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            temperature,
            response_format: None,
        }
    }
}

// ── Response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Token usage reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The distilled result of one chat call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// `choices[0].message.content`, empty string when the model sent none.
    pub content: String,
    /// Token usage, when the endpoint reported it.
    pub usage: Option<Usage>,
    /// `finish_reason` of the first choice ("stop", "length", …).
    pub finish_reason: Option<String>,
}

// ── Trait seams ──────────────────────────────────────────────────────────

/// A chat-completion endpoint.
///
/// Exactly one request, exactly one response; retry policy belongs to
/// callers (and per the pipeline contract there is none beyond truncation
/// resumption).
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, Pdf2CardsError>;
}

/// Sink for per-call token usage and estimated cost.
///
/// External collaborator: the host application decides whether this lands in
/// a database, a metrics pipeline, or nowhere.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, model: &str, usage: &Usage, estimated_cost_usd: f64);
}

// ── Pricing ──────────────────────────────────────────────────────────────

/// (input, output) USD per 1M tokens. Unknown models fall back to
/// `DEFAULT_PRICE`.
static MODEL_PRICES: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4o", (2.50, 10.00)),
        ("gpt-4o-mini", (0.15, 0.60)),
        ("gpt-4.1", (2.00, 8.00)),
        ("gpt-4.1-mini", (0.40, 1.60)),
        ("gpt-4.1-nano", (0.10, 0.40)),
        ("gpt-4-turbo", (10.00, 30.00)),
        ("gpt-3.5-turbo", (0.50, 1.50)),
    ])
});

const DEFAULT_PRICE: (f64, f64) = (2.50, 10.00);

/// Estimated USD cost of a call, from the per-model price table.
pub fn estimate_cost(model: &str, usage: &Usage) -> f64 {
    let (input, output) = MODEL_PRICES.get(model).copied().unwrap_or(DEFAULT_PRICE);
    (usage.prompt_tokens as f64 * input + usage.completion_tokens as f64 * output) / 1_000_000.0
}

/// Estimated USD cost of processing `tokens` input tokens, used for the
/// upfront confirmation message before any call is made.
///
/// Assumes output roughly a quarter the size of input, which matches what
/// pair extraction produces in practice.
pub fn estimate_processing_cost(model: &str, input_tokens: u64) -> f64 {
    let (input, output) = MODEL_PRICES.get(model).copied().unwrap_or(DEFAULT_PRICE);
    (input_tokens as f64 * input + (input_tokens / 4) as f64 * output) / 1_000_000.0
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// Production [`ChatApi`] over reqwest.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiChatClient {
    /// Build a client for the given endpoint.
    ///
    /// Falls back to the `OPENAI_API_KEY` environment variable when no key
    /// is supplied.
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, Pdf2CardsError> {
        let api_key = match api_key {
            Some(k) if !k.is_empty() => k,
            _ => std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(Pdf2CardsError::ApiKeyMissing)?,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2CardsError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatApi for OpenAiChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, Pdf2CardsError> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Pdf2CardsError::ChatApiError {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Pdf2CardsError::ChatApiError {
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| Pdf2CardsError::ChatApiError {
            message: format!("unparseable response body: {e}"),
        })?;

        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Pdf2CardsError::ChatApiError {
                message: "response contained no choices".to_string(),
            })?;

        let outcome = ChatOutcome {
            content: first.message.content.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: first.finish_reason,
        };

        debug!(
            model = %request.model,
            prompt_tokens = outcome.usage.map(|u| u.prompt_tokens).unwrap_or(0),
            completion_tokens = outcome.usage.map(|u| u.completion_tokens).unwrap_or(0),
            finish_reason = outcome.finish_reason.as_deref().unwrap_or("-"),
            "chat completion"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_without_null_response_format() {
        let req = ChatRequest::from_prompt("gpt-4o-mini", "hello", 0.3);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("response_format"));
        assert!(json.contains(r#""model":"gpt-4o-mini""#));
        assert!(json.contains(r#""temperature":0.3"#));
    }

    #[test]
    fn request_serialises_json_object_format() {
        let mut req = ChatRequest::from_prompt("gpt-4o-mini", "hello", 0.0);
        req.response_format = Some(ResponseFormat::json_object());
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""response_format":{"type":"json_object"}"#));
    }

    #[test]
    fn response_parses_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn cost_estimate_uses_model_table() {
        let usage = Usage {
            prompt_tokens: 1_000_000,
            completion_tokens: 0,
        };
        let cost = estimate_cost("gpt-4o-mini", &usage);
        assert!((cost - 0.15).abs() < 1e-9, "got {cost}");
    }

    #[test]
    fn cost_estimate_unknown_model_uses_default() {
        let usage = Usage {
            prompt_tokens: 1_000_000,
            completion_tokens: 0,
        };
        assert!((estimate_cost("mystery-model", &usage) - 2.50).abs() < 1e-9);
    }

    #[test]
    fn processing_cost_positive_for_nonempty_input() {
        assert!(estimate_processing_cost("gpt-4o-mini", 10_000) > 0.0);
    }

    #[test]
    fn missing_key_is_reported() {
        // Ensure the env var cannot satisfy the lookup.
        std::env::remove_var("OPENAI_API_KEY");
        let result = OpenAiChatClient::new("https://api.openai.com/v1", None, 10);
        assert!(matches!(result, Err(Pdf2CardsError::ApiKeyMissing)));
    }
}
