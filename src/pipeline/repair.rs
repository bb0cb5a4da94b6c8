//! Truncation detection and JSON repair for model output.
//!
//! ## Why is repair necessary?
//!
//! Even well-prompted models routinely return JSON that is *almost* valid:
//!
//! - cut off mid-array when the completion hits the token ceiling
//! - trailing commas before a closing bracket
//! - single-quoted strings or bare object keys, Python-style
//!
//! This module holds the two heuristics the resumable completion layer is
//! built on, as independently testable units: [`is_incomplete_json`] decides
//! whether a response was truncated, [`sanitize_json`] applies cheap,
//! deterministic repair rules. Keeping them out of the resumption control
//! flow means repair strategies can evolve without touching how completions
//! are driven.
//!
//! ## Rule Order
//!
//! Repair rules run in a fixed order: quote normalisation before key quoting
//! (so normalised keys are seen by the key rule), trailing-comma removal
//! last (the earlier rules never introduce commas, but the input may combine
//! all three defects).

use once_cell::sync::Lazy;
use regex::Regex;

// ── Truncation detection ─────────────────────────────────────────────────

/// Heuristic: does this text look like JSON that stopped early?
///
/// Returns true when bracket counts are unbalanced, when the text opens with
/// `[`/`{` but does not close with the matching bracket, or when
/// JSON-shaped text (contains a bracket at all) fails to parse. Plain prose
/// without brackets is never "incomplete" — there is nothing to resume.
pub fn is_incomplete_json(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let json_shaped = trimmed.contains('[') || trimmed.contains('{');
    if !json_shaped {
        return false;
    }

    let opens_square = trimmed.matches('[').count();
    let closes_square = trimmed.matches(']').count();
    let opens_curly = trimmed.matches('{').count();
    let closes_curly = trimmed.matches('}').count();
    if opens_square != closes_square || opens_curly != closes_curly {
        return true;
    }

    if trimmed.starts_with('[') && !trimmed.ends_with(']') {
        return true;
    }
    if trimmed.starts_with('{') && !trimmed.ends_with('}') {
        return true;
    }

    serde_json::from_str::<serde_json::Value>(trimmed).is_err()
}

// ── Repair ───────────────────────────────────────────────────────────────

/// Attempt to turn almost-JSON into JSON.
///
/// Parses as-is first; on failure runs the repair rules and re-validates.
/// If repair still does not parse, the ORIGINAL input is returned unchanged
/// so the caller's own parse attempt fails explicitly instead of receiving
/// silently mangled text that happens to parse into the wrong thing.
pub fn sanitize_json(input: &str) -> String {
    if serde_json::from_str::<serde_json::Value>(input).is_ok() {
        return input.to_string();
    }

    let repaired = normalise_single_quotes(input);
    let repaired = quote_bare_keys(&repaired);
    let repaired = remove_trailing_commas(&repaired);

    if serde_json::from_str::<serde_json::Value>(&repaired).is_ok() {
        repaired
    } else {
        input.to_string()
    }
}

// ── Rule 1: Single-quoted strings → double-quoted ────────────────────────

static RE_SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^'\\]*)'").unwrap());

fn normalise_single_quotes(input: &str) -> String {
    RE_SINGLE_QUOTED.replace_all(input, "\"$1\"").to_string()
}

// ── Rule 2: Bare object keys → quoted keys ───────────────────────────────

static RE_BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());

fn quote_bare_keys(input: &str) -> String {
    RE_BARE_KEY.replace_all(input, "$1\"$2\":").to_string()
}

// ── Rule 3: Trailing commas before a closer ──────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([\]}])").unwrap());

fn remove_trailing_commas(input: &str) -> String {
    RE_TRAILING_COMMA.replace_all(input, "$1").to_string()
}
