//! # pdf2cards
//!
//! Turn a user-supplied PDF into a bilingual flashcard deck.
//!
//! ## Why this crate?
//!
//! Vocabulary PDFs come in two kinds: born-digital files with a clean text
//! layer, and photographed or scanned pages with none. This crate handles
//! both — direct text recovery with an OCR fallback — then slices the text
//! into model-context-sized chunks and asks a chat model to extract
//! `{front, back}` translation pairs, compensating for the model's habit of
//! truncating or mangling JSON along the way.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract  text layer first, ocrmypdf fallback (live progress)
//!  ├─ 2. Chunk    token-budget splitting on paragraph/sentence boundaries
//!  ├─ 3. Pairs    per-chunk chat completion with truncation resumption
//!  │              and a JSON-repair / regex / line-mode fallback chain
//!  ├─ 4. Merge    case-insensitive dedup by card front, first seen wins
//!  └─ 5. Deck     external builder turns pairs into a binary package
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2cards::{extract, ExtractionConfig, NoopProgress};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let progress = Arc::new(NoopProgress) as pdf2cards::ProgressHandle;
//!     let result = extract(Path::new("words.pdf"), &progress, &config.languages, &config).await?;
//!     println!("{} pages, ocr: {}", result.page_count, result.ocr_used);
//!     Ok(())
//! }
//! ```
//!
//! The chat-driven stages need an `OPENAI_API_KEY` (or an injected
//! [`llm::ChatApi`]); extraction and chunking run fully offline.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2cards` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2cards = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::Pdf2CardsError;
pub use pipeline::chunk::{split, TextChunk};
pub use pipeline::completion::CompletionLayer;
pub use pipeline::extract::{extract, ExtractedText};
pub use pipeline::pairs::{dedupe_pairs, extract_pairs, WordPair};
pub use pipeline::repair::{is_incomplete_json, sanitize_json};
pub use progress::{ExtractProgress, ExtractionProgress, NoopProgress, ProgressHandle};
pub use task::{
    CostEstimate, DeckBuilder, DocumentUpload, ErrorReporter, InMemoryTaskStore, Messenger,
    Notice, PendingTask, TaskOrchestrator, TaskStore, CALLBACK_ACCEPT, CALLBACK_CANCEL,
};
