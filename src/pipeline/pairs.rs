//! Word-pair extraction from chunk text.
//!
//! Sends one chunk to the model and turns whatever comes back into validated
//! [`WordPair`]s. The model's output quality varies wildly — truncated
//! arrays, fenced JSON, prose-wrapped lists — so parsing is a fallback
//! chain, each step cheaper and more tolerant than the last:
//!
//! 1. strict JSON array parse (after fence stripping and, when truncated,
//!    one bounded resumption)
//! 2. regex extraction of `{"front":…,"back":…}` fragments from the raw text
//! 3. line-based `front - back` parsing
//! 4. empty result
//!
//! Only the initial model call itself can fail; everything downstream
//! degrades. Dedup policy is canonical everywhere: lowercased `front`,
//! first seen wins.

use crate::config::ExtractionConfig;
use crate::error::Pdf2CardsError;
use crate::pipeline::completion::CompletionLayer;
use crate::pipeline::repair::is_incomplete_json;
use crate::prompts::pair_extraction_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One flashcard: `front` in the learning language, `back` its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub front: String,
    pub back: String,
}

impl WordPair {
    /// Build a pair with both sides trimmed.
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into().trim().to_string(),
            back: back.into().trim().to_string(),
        }
    }

    /// A usable card: both sides at least two characters.
    ///
    /// Single characters are OCR debris or list markers, never vocabulary.
    pub fn is_valid(&self) -> bool {
        self.front.chars().count() >= 2 && self.back.chars().count() >= 2
    }

    /// Canonical dedup identity.
    pub fn dedup_key(&self) -> String {
        self.front.to_lowercase()
    }
}

/// Drop pairs whose lowercased `front` was already seen. First seen wins.
pub fn dedupe_pairs(pairs: impl IntoIterator<Item = WordPair>) -> Vec<WordPair> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for pair in pairs {
        if seen.insert(pair.dedup_key()) {
            out.push(pair);
        }
    }
    out
}

/// Extract validated, deduplicated pairs from one chunk.
///
/// Returns `Err` only when the initial model call fails; parse trouble of
/// any kind degrades through the fallback chain down to an empty vec.
pub async fn extract_pairs(
    completion: &CompletionLayer,
    config: &ExtractionConfig,
    chunk_text: &str,
    learning_language: &str,
    user_language: &str,
) -> Result<Vec<WordPair>, Pdf2CardsError> {
    let prompt = pair_extraction_prompt(chunk_text, learning_language, user_language);
    let raw = completion.chat_completion(&prompt, config.temperature).await?;
    let mut text = strip_code_fences(&raw);

    if is_incomplete_json(&text) {
        for attempt in 1..=config.resume_attempts {
            debug!(attempt, "response looks truncated, resuming");
            match completion
                .resume_completion(&text, &prompt, config.temperature)
                .await
            {
                Ok(resumed) => {
                    text = strip_code_fences(&resumed);
                    if !is_incomplete_json(&text) {
                        break;
                    }
                }
                Err(e) => {
                    // Resumption is best-effort; fall through to the
                    // parse chain with what we have.
                    warn!("resume failed: {e}");
                    break;
                }
            }
        }
    }

    let pairs = parse_json_pairs(&text)
        .or_else(|| {
            debug!("strict parse failed, trying fragment extraction");
            parse_pair_fragments(&raw)
        })
        .or_else(|| {
            debug!("fragment extraction failed, trying line mode");
            parse_pair_lines(&raw)
        })
        .unwrap_or_default();

    let valid = dedupe_pairs(pairs.into_iter().filter(WordPair::is_valid));

    if valid.len() < config.min_pairs_warning {
        warn!(
            found = valid.len(),
            chunk_len = chunk_text.len(),
            "chunk yielded fewer pairs than expected"
        );
    }

    Ok(valid)
}

// ── Parse chain ──────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip an outer code fence the model added despite being told not to.
fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.trim().to_string(),
    }
}

/// Strict mode: the text is a JSON array of pair objects.
///
/// Invalid entries (missing keys, wrong types) are discarded individually
/// rather than failing the whole array.
fn parse_json_pairs(text: &str) -> Option<Vec<WordPair>> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let entries = value.as_array()?;
    let pairs = entries
        .iter()
        .filter_map(|entry| {
            let front = entry.get("front")?.as_str()?;
            let back = entry.get("back")?.as_str()?;
            Some(WordPair::new(front, back))
        })
        .collect::<Vec<_>>();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

static RE_PAIR_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\s*"front"\s*:\s*"((?:[^"\\]|\\.)*)"\s*,\s*"back"\s*:\s*"((?:[^"\\]|\\.)*)"\s*\}"#,
    )
    .unwrap()
});

/// Fragment mode: fish complete pair objects out of otherwise broken text.
fn parse_pair_fragments(text: &str) -> Option<Vec<WordPair>> {
    let pairs: Vec<WordPair> = RE_PAIR_FRAGMENT
        .captures_iter(text)
        .filter_map(|caps| {
            let front = unescape_json_string(&caps[1])?;
            let back = unescape_json_string(&caps[2])?;
            Some(WordPair::new(front, back))
        })
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

/// Decode JSON string escapes by round-tripping through serde.
fn unescape_json_string(raw: &str) -> Option<String> {
    serde_json::from_str(&format!("\"{raw}\"")).ok()
}

/// Line mode: `front - back`, one pair per line, tolerating list markers.
fn parse_pair_lines(text: &str) -> Option<Vec<WordPair>> {
    let pairs: Vec<WordPair> = text
        .lines()
        .filter_map(|line| {
            let line = line
                .trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start();
            let (front, back) = line.split_once(" - ")?;
            Some(WordPair::new(front, back))
        })
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}
