//! Prompts for word-pair extraction and completion resumption.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the extraction behaviour (e.g.
//!    tightening the JSON rules) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, making prompt regressions easy to catch.

/// Build the extraction prompt for one chunk of source text.
///
/// The model is asked for a bare JSON array of `{front, back}` objects;
/// every formatting rule exists because a model has violated it at least
/// once (fences, commentary, duplicate entries).
pub fn pair_extraction_prompt(chunk_text: &str, learning_language: &str, user_language: &str) -> String {
    format!(
        r#"You are building vocabulary flashcards from a text written in {learning}.

Extract every useful word or short expression from the text below and translate it into {user}.

Rules:
1. Respond with ONLY a JSON array, no commentary, no code fences.
2. Each element is an object: {{"front": "<word in {learning}>", "back": "<translation in {user}>"}}.
3. "front" must be a dictionary form (lemma) taken from the text.
4. Skip names, numbers, and single letters.
5. Do not repeat a word that already appeared in your answer.

Text:
"""
{chunk}
""""#,
        learning = learning_language,
        user = user_language,
        chunk = chunk_text,
    )
}

/// Build the continuation prompt for a truncated completion.
///
/// Embeds both the original request and the partial answer so the model can
/// pick up mid-token. The "do not repeat" instruction matters: without it
/// models restart the array from the beginning and the concatenation becomes
/// double-counted garbage.
pub fn continuation_prompt(original_prompt: &str, partial_response: &str) -> String {
    format!(
        r#"Your previous response was cut off before it finished. Continue it EXACTLY from where it stopped.

Do not repeat any text you already produced. Do not add commentary. Output only the continuation, so that concatenating your previous response and this one forms a single valid answer.

The original request was:
"""
{original_prompt}
"""

Your response so far:
"""
{partial_response}
""""#
    )
}
