//! Token-budget text chunker.
//!
//! Splits recovered document text into [`TextChunk`]s sized for a language
//! model's input window. Splitting prefers blank-line paragraph boundaries
//! to preserve semantic coherence; a paragraph that alone exceeds the budget
//! degrades to sentence-level accumulation.
//!
//! # Algorithm
//!
//! 1. Budget = explicit override, or 80 % of the model's known maximum input
//!    tokens (table lookup, conservative default for unknown models).
//! 2. Split on blank-line boundaries; accumulate paragraphs while the
//!    running estimate stays within budget, re-estimating per addition.
//! 3. A paragraph that alone busts the budget switches to sentence-level
//!    splitting (`.`, `!`, `?` terminators) with the same accumulation.
//! 4. Flush the trailing partial chunk.
//!
//! Invariant: concatenating all chunk texts reproduces the source up to
//! whitespace normalisation at the split points — nothing is dropped or
//! duplicated.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A bounded-size slice of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Estimated tokens in `text`, per the model's estimator.
    pub token_count: usize,
}

// ── Model limits ─────────────────────────────────────────────────────────

/// Maximum input tokens per model. The chunker budgets against 80 % of this.
static MODEL_TOKEN_LIMITS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4o", 128_000),
        ("gpt-4o-mini", 128_000),
        ("gpt-4-turbo", 128_000),
        ("gpt-4", 8_192),
        ("gpt-3.5-turbo", 16_385),
        ("gpt-4.1", 1_047_576),
        ("gpt-4.1-mini", 1_047_576),
        ("gpt-4.1-nano", 1_047_576),
    ])
});

/// Conservative fallback when the model is not in the table.
const DEFAULT_MODEL_TOKEN_LIMIT: usize = 8_192;

/// Fraction of the context window the chunker is allowed to fill, leaving
/// headroom for prompt scaffolding and the response.
const BUDGET_FRACTION: f64 = 0.8;

/// Known maximum input tokens for `model`.
pub fn model_token_limit(model: &str) -> usize {
    MODEL_TOKEN_LIMITS
        .get(model)
        .copied()
        .unwrap_or(DEFAULT_MODEL_TOKEN_LIMIT)
}

// ── Token estimation ─────────────────────────────────────────────────────

/// Characters-per-token ratios by model family.
///
/// The corpus convention: token counts are estimated from character length
/// rather than running a real tokenizer over every accumulation step. The
/// o200k vocabularies (gpt-4o family) pack slightly more characters per
/// token than cl100k.
static MODEL_CHAR_RATIOS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4o", 4.4),
        ("gpt-4o-mini", 4.4),
        ("gpt-4.1", 4.4),
        ("gpt-4.1-mini", 4.4),
        ("gpt-4.1-nano", 4.4),
    ])
});

const DEFAULT_CHAR_RATIO: f64 = 4.0;

/// Per-model token estimator.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl TokenEstimator {
    fn for_model(model: &str) -> Self {
        Self {
            chars_per_token: MODEL_CHAR_RATIOS
                .get(model)
                .copied()
                .unwrap_or(DEFAULT_CHAR_RATIO),
        }
    }

    /// Estimated token count of `text`.
    pub fn estimate(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Estimator cache keyed by model name.
///
/// The chunker re-estimates on every paragraph addition; constructing the
/// estimator once per model keeps that loop allocation-free.
static ESTIMATORS: Lazy<Mutex<HashMap<String, Arc<TokenEstimator>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch (or build and cache) the estimator for `model`.
pub fn estimator_for(model: &str) -> Arc<TokenEstimator> {
    let mut cache = ESTIMATORS.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(model.to_string())
        .or_insert_with(|| Arc::new(TokenEstimator::for_model(model)))
        .clone()
}

// ── Splitting ────────────────────────────────────────────────────────────

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Sentence = run of text closed by `.`, `!` or `?` (plus trailing space),
/// or a final unterminated run.
static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]+\s*|[^.!?]+$").unwrap());

/// Split `text` into chunks within the token budget for `model`.
///
/// `max_chunk_tokens` overrides the derived budget when given. Blank input
/// yields no chunks.
pub fn split(model: &str, text: &str, max_chunk_tokens: Option<usize>) -> Vec<TextChunk> {
    let budget = max_chunk_tokens
        .unwrap_or_else(|| (model_token_limit(model) as f64 * BUDGET_FRACTION) as usize)
        .max(1);
    let estimator = estimator_for(model);

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();

    for paragraph in RE_PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if accumulate(&mut current, paragraph, "\n\n", budget, &estimator) {
            continue;
        }

        flush(&mut chunks, &mut current, &estimator);

        if estimator.estimate(paragraph) <= budget {
            current.push_str(paragraph);
            continue;
        }

        // Single paragraph over budget: degrade to sentence accumulation.
        for sentence in RE_SENTENCE.find_iter(paragraph) {
            let sentence = sentence.as_str().trim();
            if sentence.is_empty() {
                continue;
            }
            if !accumulate(&mut current, sentence, " ", budget, &estimator) {
                flush(&mut chunks, &mut current, &estimator);
                // An over-budget single sentence still becomes its own
                // chunk; the overflow is unavoidable without cutting words.
                current.push_str(sentence);
            }
        }
        flush(&mut chunks, &mut current, &estimator);
    }

    flush(&mut chunks, &mut current, &estimator);
    chunks
}

/// Append `piece` to `current` (with `joiner`) when the result stays within
/// budget. Returns false when it would not fit and `current` is unchanged.
fn accumulate(
    current: &mut String,
    piece: &str,
    joiner: &str,
    budget: usize,
    estimator: &TokenEstimator,
) -> bool {
    let candidate_len = if current.is_empty() {
        estimator.estimate(piece)
    } else {
        estimator.estimate(current) + estimator.estimate(joiner) + estimator.estimate(piece)
    };
    if candidate_len > budget {
        return false;
    }
    if !current.is_empty() {
        current.push_str(joiner);
    }
    current.push_str(piece);
    true
}

fn flush(chunks: &mut Vec<TextChunk>, current: &mut String, estimator: &TokenEstimator) {
    if current.is_empty() {
        return;
    }
    let text = std::mem::take(current);
    let token_count = estimator.estimate(&text);
    chunks.push(TextChunk { text, token_count });
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Whitespace-normalised view, for the losslessness property.
    fn normalised(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = split("gpt-4o-mini", "Hello world, this is a short text.", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world, this is a short text.");
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        assert!(split("gpt-4o-mini", "", None).is_empty());
        assert!(split("gpt-4o-mini", "  \n\n  \n", None).is_empty());
    }

    #[test]
    fn paragraphs_split_when_over_budget() {
        let text = "First paragraph with several words in it.\n\nSecond paragraph with several words.\n\nThird paragraph closing things out.";
        let chunks = split("gpt-4o-mini", text, Some(12));
        assert!(chunks.len() > 1, "got {} chunks", chunks.len());
        for c in &chunks {
            assert!(c.token_count <= 12, "chunk over budget: {:?}", c);
        }
    }

    #[test]
    fn concatenation_reconstructs_source() {
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta eta theta.\n\nIota kappa. Lambda mu nu xi. Omicron pi rho!";
        let chunks = split("gpt-4o-mini", text, Some(6));
        let rebuilt = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(normalised(&rebuilt), normalised(text));
    }

    #[test]
    fn oversized_paragraph_falls_back_to_sentences() {
        // One paragraph, many sentences, tiny budget: must split inside it.
        let text = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let chunks = split("gpt-4o-mini", text, Some(5));
        assert!(chunks.len() >= 2);
        assert_eq!(
            normalised(&chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ")),
            normalised(text)
        );
    }

    #[test]
    fn oversized_single_sentence_becomes_own_chunk() {
        let text = "word ".repeat(100);
        let chunks = split("gpt-4o-mini", text.trim(), Some(5));
        assert_eq!(chunks.len(), 1, "an unbreakable sentence may overflow");
        assert!(chunks[0].token_count > 5);
    }

    #[test]
    fn exclamation_and_question_terminate_sentences() {
        let text = "Really! Is that so? Indeed.";
        let sentences: Vec<&str> = RE_SENTENCE
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .collect();
        assert_eq!(sentences, vec!["Really!", "Is that so?", "Indeed."]);
    }

    #[test]
    fn unknown_model_uses_default_limit() {
        assert_eq!(model_token_limit("mystery-model"), 8_192);
        assert_eq!(model_token_limit("gpt-4o"), 128_000);
    }

    #[test]
    fn estimator_is_cached_per_model() {
        let a = estimator_for("gpt-4o-mini");
        let b = estimator_for("gpt-4o-mini");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn token_counts_recorded_per_chunk() {
        let chunks = split("gpt-4o-mini", "Some reasonable chunk of text here.", None);
        assert_eq!(
            chunks[0].token_count,
            estimator_for("gpt-4o-mini").estimate(&chunks[0].text)
        );
    }

    #[test]
    fn default_budget_is_80_percent_of_limit() {
        // A text just above 80% of a tiny synthetic budget splits; with the
        // real default budget for a known model it stays whole.
        let text = "word ".repeat(2_000);
        let chunks = split("gpt-4o", text.trim(), None);
        assert_eq!(chunks.len(), 1);
    }
}
