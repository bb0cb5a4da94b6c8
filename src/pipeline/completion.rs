//! Resumable chat completions.
//!
//! Wraps a single chat call with truncation detection and continuation. The
//! module is intentionally thin — truncation heuristics and JSON repair live
//! in [`crate::pipeline::repair`], prompt wording in [`crate::prompts`] —
//! so resumption control flow can be read in one screen.
//!
//! ## No retry loop
//!
//! A failed chat call fails the current step immediately. The only sanctioned
//! recovery in this pipeline is truncation-specific resumption: ask the model
//! to continue from where it stopped, at most once or twice, then give up
//! and let the caller's fallback chain deal with whatever came back.

use crate::config::ExtractionConfig;
use crate::error::Pdf2CardsError;
use crate::llm::{estimate_cost, ChatApi, ChatRequest, OpenAiChatClient, UsageRecorder};
use crate::pipeline::repair::sanitize_json;
use crate::prompts::continuation_prompt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A chat endpoint plus the accounting that wraps every call.
pub struct CompletionLayer {
    api: Arc<dyn ChatApi>,
    model: String,
    usage_recorder: Option<Arc<dyn UsageRecorder>>,
}

impl CompletionLayer {
    /// Build from config, constructing the HTTP client unless one was
    /// injected.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, Pdf2CardsError> {
        let api: Arc<dyn ChatApi> = match &config.chat_client {
            Some(client) => Arc::clone(client),
            None => Arc::new(OpenAiChatClient::new(
                config.api_base.clone(),
                config.api_key.clone(),
                config.api_timeout_secs,
            )?),
        };
        Ok(Self {
            api,
            model: config.model.clone(),
            usage_recorder: config.usage_recorder.clone(),
        })
    }

    /// Build directly from parts (used by tests).
    pub fn new(api: Arc<dyn ChatApi>, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
            usage_recorder: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One request, one response.
    ///
    /// Records token usage and estimated cost against the configured
    /// [`UsageRecorder`] when the endpoint reported usage.
    pub async fn chat_completion(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, Pdf2CardsError> {
        let request = ChatRequest::from_prompt(self.model.as_str(), prompt, temperature);
        let outcome = self.api.chat(request).await?;

        if let (Some(recorder), Some(usage)) = (&self.usage_recorder, outcome.usage) {
            recorder.record(&self.model, &usage, estimate_cost(&self.model, &usage));
        }

        Ok(outcome.content)
    }

    /// Continue a truncated response.
    ///
    /// Sends a continuation prompt embedding both the original request and
    /// the partial answer, then stitches the two pieces together. For
    /// JSON-shaped partials the concatenation is run through
    /// [`sanitize_json`] and parse-checked; prose is concatenated as-is.
    ///
    /// Resumption is a mitigation, not a guarantee: the returned text may
    /// still fail to parse, and callers must handle that.
    pub async fn resume_completion(
        &self,
        partial_response: &str,
        original_prompt: &str,
        temperature: f32,
    ) -> Result<String, Pdf2CardsError> {
        debug!(
            partial_len = partial_response.len(),
            "resuming truncated completion"
        );

        let prompt = continuation_prompt(original_prompt, partial_response);
        let continuation = self.chat_completion(&prompt, temperature).await?;
        let combined = format!("{partial_response}{continuation}");

        let json_shaped = {
            let head = partial_response.trim_start();
            head.starts_with('[') || head.starts_with('{')
        };
        if !json_shaped {
            return Ok(combined);
        }

        let sanitized = sanitize_json(&combined);
        if serde_json::from_str::<serde_json::Value>(&sanitized).is_err() {
            warn!("resumed completion still does not parse as JSON");
        }
        Ok(sanitized)
    }
}
