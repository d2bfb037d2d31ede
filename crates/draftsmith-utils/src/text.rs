//! Small text helpers shared across stages.

/// Characters per token used for rough token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Whitespace-delimited word count.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Rough token estimate: `ceil(chars / 4)`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
///
/// Returns the input unchanged when it already fits.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate to `max_chars` and append a marker when anything was cut.
///
/// The marker counts against the budget, so the result never exceeds
/// `max_chars` characters unless the budget is smaller than the marker.
#[must_use]
pub fn truncate_with_marker(text: &str, max_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(marker.chars().count());
    let mut out = truncate_chars(text, keep).trim_end().to_string();
    out.push_str(marker);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one\ttwo\nthree  "), 3);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_truncate_with_marker() {
        assert_eq!(truncate_with_marker("abc", 5, "..."), "abc");
        assert_eq!(truncate_with_marker("abcdefghij", 6, "..."), "abc...");
    }

    proptest! {
        #[test]
        fn prop_truncate_never_exceeds_budget(s in ".{0,200}", n in 0usize..100) {
            prop_assert!(truncate_chars(&s, n).chars().count() <= n);
        }

        #[test]
        fn prop_marker_truncation_within_budget(s in "[a-z ]{0,200}", n in 3usize..100) {
            prop_assert!(truncate_with_marker(&s, n, "...").chars().count() <= n);
        }
    }
}
