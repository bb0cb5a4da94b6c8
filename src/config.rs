//! Configuration for the extraction pipeline.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Keeping the whole pipeline's behaviour in one
//! struct makes it trivial to share across tasks, log, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::Pdf2CardsError;
use crate::llm::{ChatApi, UsageRecorder};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for PDF-to-flashcards extraction.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2cards::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .languages(["hun", "eng"])
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Chat model identifier, e.g. "gpt-4o-mini". Default: "gpt-4o-mini".
    ///
    /// Also keys the token-limit and price tables; an unknown model falls
    /// back to a conservative 8 192-token context.
    pub model: String,

    /// Base URL of the chat-completions endpoint. Default: OpenAI.
    ///
    /// Point this at any OpenAI-compatible server (a proxy, a local
    /// llama.cpp, a test fixture) without touching the rest of the pipeline.
    pub api_base: String,

    /// API key. Default: None, in which case the client reads
    /// `OPENAI_API_KEY` from the environment at construction time.
    pub api_key: Option<String>,

    /// Pre-constructed chat client. Takes precedence over `api_base`/`api_key`.
    ///
    /// The injection slot used by tests and by callers that need custom
    /// middleware (caching, rate limiting) around the HTTP client.
    pub chat_client: Option<Arc<dyn ChatApi>>,

    /// Optional sink for per-call token usage and estimated cost.
    pub usage_recorder: Option<Arc<dyn UsageRecorder>>,

    /// Sampling temperature for extraction calls. Default: 0.3.
    ///
    /// Word-pair extraction is a transcription-like task; low temperature
    /// keeps the model faithful to the chunk text. Higher values start
    /// inventing vocabulary that is not on the page.
    pub temperature: f32,

    /// Explicit per-chunk token budget. Default: None.
    ///
    /// When None the chunker uses 80 % of the model's known maximum input
    /// tokens, leaving headroom for the prompt scaffolding and the response.
    pub max_chunk_tokens: Option<usize>,

    /// OCR language codes passed to the OCR tool, e.g. `["hun", "eng"]`.
    /// Default: `["eng"]`.
    pub languages: Vec<String>,

    /// Minimum length of directly-parsed text that counts as "the PDF has a
    /// text layer". Default: 50.
    ///
    /// Below this the text is assumed to be junk (a stray header, metadata
    /// echo) and the extractor falls back to OCR.
    pub min_text_len: usize,

    /// Upper bound on the page range handed to the OCR tool. Default: 50.
    ///
    /// OCR cost grows linearly with pages; this caps the worst case for
    /// very large scanned documents.
    pub max_ocr_pages: usize,

    /// Minimum wall-clock spacing between progress events. Default: 1 s.
    ///
    /// OCR emits a stderr line per page; without throttling a 200-page scan
    /// would fire 200 message edits at the host platform.
    pub progress_interval: Duration,

    /// How many times a truncated completion may be resumed. Default: 1.
    ///
    /// Clamped to 2 by the builder. Resumption is a mitigation, not a
    /// guarantee — callers still handle final parse failure.
    pub resume_attempts: u32,

    /// Emit a warning when a chunk yields fewer valid pairs than this.
    /// Default: 5.
    pub min_pairs_warning: usize,

    /// Maximum accepted upload size in bytes. Default: 20 MiB.
    pub max_file_size: u64,

    /// Root directory for downloaded files, hash records, and extracted-text
    /// blobs. Default: `./pdf2cards-data`.
    pub data_dir: PathBuf,

    /// Transport-level timeout for chat API calls in seconds. Default: 120.
    ///
    /// This is the only timeout in the pipeline; the OCR subprocess and the
    /// overall task deliberately have none.
    pub api_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_client: None,
            usage_recorder: None,
            temperature: 0.3,
            max_chunk_tokens: None,
            languages: vec!["eng".to_string()],
            min_text_len: 50,
            max_ocr_pages: 50,
            progress_interval: Duration::from_secs(1),
            resume_attempts: 1,
            min_pairs_warning: 5,
            max_file_size: 20 * 1024 * 1024,
            data_dir: PathBuf::from("pdf2cards-data"),
            api_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chat_client", &self.chat_client.as_ref().map(|_| "<dyn ChatApi>"))
            .field("temperature", &self.temperature)
            .field("max_chunk_tokens", &self.max_chunk_tokens)
            .field("languages", &self.languages)
            .field("min_text_len", &self.min_text_len)
            .field("max_ocr_pages", &self.max_ocr_pages)
            .field("progress_interval", &self.progress_interval)
            .field("resume_attempts", &self.resume_attempts)
            .field("max_file_size", &self.max_file_size)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn chat_client(mut self, client: Arc<dyn ChatApi>) -> Self {
        self.config.chat_client = Some(client);
        self
    }

    pub fn usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.config.usage_recorder = Some(recorder);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_chunk_tokens(mut self, n: usize) -> Self {
        self.config.max_chunk_tokens = Some(n);
        self
    }

    pub fn languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_text_len(mut self, n: usize) -> Self {
        self.config.min_text_len = n;
        self
    }

    pub fn max_ocr_pages(mut self, n: usize) -> Self {
        self.config.max_ocr_pages = n.max(1);
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn resume_attempts(mut self, n: u32) -> Self {
        // At most once or twice per call site; more never recovers anything.
        self.config.resume_attempts = n.min(2);
        self
    }

    pub fn min_pairs_warning(mut self, n: usize) -> Self {
        self.config.min_pairs_warning = n;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2CardsError> {
        let c = &self.config;
        if c.model.is_empty() {
            return Err(Pdf2CardsError::InvalidConfig("model must not be empty".into()));
        }
        if c.languages.is_empty() {
            return Err(Pdf2CardsError::InvalidConfig(
                "at least one OCR language is required".into(),
            ));
        }
        if let Some(n) = c.max_chunk_tokens {
            if n == 0 {
                return Err(Pdf2CardsError::InvalidConfig(
                    "max_chunk_tokens must be ≥ 1".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
