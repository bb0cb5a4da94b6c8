//! Pipeline stages for PDF-to-flashcards extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different OCR engine's progress parser)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ chunk ──▶ pairs ──▶ merge/dedupe
//! (text/ocr)  (budget)  (completion + repair)
//! ```
//!
//! 1. [`input`]      — validate or download the source PDF (magic bytes,
//!    size cap)
//! 2. [`text`]       — direct text-layer parse and page count (spawn_blocking,
//!    PDF parsing is CPU-bound)
//! 3. [`ocr`]        — ocrmypdf subprocess with live stderr progress parsing
//! 4. [`extract`]    — orchestrates direct-first / OCR-fallback recovery
//! 5. [`chunk`]      — token-budget splitting on paragraph and sentence
//!    boundaries
//! 6. [`repair`]     — truncation detection and JSON repair heuristics
//! 7. [`completion`] — single chat call wrapped with bounded resumption; the
//!    only stage with network I/O
//! 8. [`pairs`]      — per-chunk word-pair extraction with the parse
//!    fallback chain

pub mod chunk;
pub mod completion;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod pairs;
pub mod repair;
pub mod text;
