//! Markdown code-fence handling

use once_cell::sync::Lazy;
use regex::Regex;

/// First fenced block anywhere in the text, with an optional language tag.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("valid regex")
});

/// Strip one layer of code-fence wrapping when the entire response is fenced.
///
/// Text that is not wholly wrapped is returned trimmed but otherwise
/// untouched. An unterminated opening fence (a truncated response) is
/// stripped as well.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opening fence line, including any language tag.
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.trim_start_matches('`').trim(),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Content of the first fenced block embedded anywhere in the text.
#[must_use]
pub fn find_fenced_block(raw: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
