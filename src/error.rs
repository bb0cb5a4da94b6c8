//! Error types for the pdf2cards library.
//!
//! The pipeline is built around graceful degradation: OCR failure falls back
//! to the directly-parsed text, truncated model JSON is resumed and repaired,
//! and pair parsing falls through regex and line-based modes before giving up.
//! [`Pdf2CardsError`] therefore covers only the failures that survive those
//! chains — bad user input, file-system trouble, and external API calls that
//! actually failed. A stage that can degrade never returns one of these.
//!
//! The variants are grouped by where the failure originates so callers can map
//! them to user-facing messages without string matching: user input, text
//! extraction, external APIs, model-output parsing, and the file system.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2cards library.
///
/// Extraction and JSON-parse failures that are absorbed by a fallback chain
/// never surface here; see the module docs.
#[derive(Debug, Error)]
pub enum Pdf2CardsError {
    // ── User input errors ─────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{}'\nCheck the path exists and is readable.", .path.display())]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{}'\nFirst bytes: {magic:?}", .path.display())]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The uploaded document exceeds the configured size cap.
    #[error("File is too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Neither the text layer nor OCR produced any usable text.
    ///
    /// The extractor itself degrades rather than failing (an OCR crash
    /// returns the directly-parsed text); it is the caller that decides an
    /// empty result means the document cannot be processed.
    #[error("No text could be recovered from '{}' ({page_count} pages)", .path.display())]
    NoTextRecovered { path: PathBuf, page_count: usize },

    /// The PDF structure could not be parsed at all (page count unknown).
    #[error("PDF '{}' could not be parsed: {detail}", .path.display())]
    CorruptPdf { path: PathBuf, detail: String },

    /// The OCR subprocess failed to spawn or exited non-zero.
    ///
    /// Never reaches callers of the extractor: OCR is a best-effort
    /// upgrade, and the extractor degrades to the directly-parsed text.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    // ── External API errors ───────────────────────────────────────────────
    /// The chat-completion endpoint returned a non-success status or an
    /// unusable body.
    #[error("Chat API error: {message}")]
    ChatApiError { message: String },

    /// No API key was configured for the chat client.
    #[error("Chat API key is not configured.\nSet OPENAI_API_KEY or supply a key via the config builder.")]
    ApiKeyMissing,

    /// A messaging-platform call (status edit, document delivery) failed.
    #[error("Messenger call failed: {message}")]
    MessengerError { message: String },

    /// The deck-builder collaborator failed to produce a package.
    #[error("Deck build failed: {message}")]
    DeckBuildError { message: String },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// Model output stayed unparseable after resumption and repair.
    ///
    /// The word-pair extractor absorbs this via its fallback chain; it is
    /// returned only from call sites that require strict JSON.
    #[error("Model returned malformed JSON: {detail}")]
    MalformedModelOutput { detail: String },

    // ── File system errors ────────────────────────────────────────────────
    /// Temp-file or cache I/O failed.
    #[error("File system error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2CardsError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2CardsError::Io {
            path: path.into(),
            source,
        }
    }
}
