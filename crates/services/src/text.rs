//! Cleanup of free text returned by the LLM.

use std::sync::LazyLock;

use regex::Regex;

static OPEN_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").ok());
static LINE_BREAK_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").ok());
static ANY_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());
static BLANK_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());

/// Remove a markdown code fence wrapping the whole of `raw`, if any.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = match OPEN_FENCE.as_ref().and_then(|re| re.find(trimmed)) {
        Some(open) => &trimmed[open.end()..],
        None => trimmed.trim_start_matches('`'),
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn replace_all(re: &LazyLock<Option<Regex>>, text: String, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(&text, with).into_owned(),
        None => text,
    }
}

/// Normalise an explanation: drop the fence, turn `<br>` into newlines,
/// remove remaining tags and collapse runs of blank lines.
#[must_use]
pub fn clean_markup(raw: &str) -> String {
    let text = strip_code_fence(raw).to_string();
    let text = replace_all(&LINE_BREAK_TAG, text, "\n");
    let text = replace_all(&ANY_TAG, text, "");
    let text = replace_all(&BLANK_RUN, text, "\n\n");
    text.trim().to_string()
}
