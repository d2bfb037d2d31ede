//! Tolerant JSON extraction from LLM responses
//!
//! Every stage that asks a model for JSON goes through [`extract_json`]:
//!
//! 1. strip a code fence wrapping the whole response (or take the first
//!    embedded fenced block)
//! 2. parse directly
//! 3. slice from the first `{`/`[` to the last matching closer and parse
//! 4. repair truncation ([`repair_json`]) and parse
//!
//! The caller learns which step succeeded, so a repaired parse can be
//! reported as degraded output.

mod fence;
mod repair;

pub use fence::{find_fenced_block, strip_code_fence};
pub use repair::{repair_json, strip_trailing_commas};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// How a JSON value was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// The (fence-stripped) response parsed as-is
    Direct,
    /// Surrounding prose was sliced away
    Sliced,
    /// Truncation was repaired by cutting and closing brackets
    Repaired,
}

impl ExtractionMethod {
    #[must_use]
    pub fn is_repaired(self) -> bool {
        self == Self::Repaired
    }
}

/// A recovered JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub method: ExtractionMethod,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("response is empty")]
    Empty,

    #[error("response contains no JSON object or array")]
    NoJson,

    #[error("JSON could not be repaired: {reason}")]
    Unrepairable { reason: String },

    #[error("JSON has unexpected shape: {reason}")]
    Shape { reason: String },
}

/// Recover a JSON value from a model response.
///
/// # Errors
///
/// Returns `ExtractionError::Empty` for blank input, `NoJson` when no
/// opening bracket exists, and `Unrepairable` when even the repaired text
/// fails to parse.
pub fn extract_json(raw: &str) -> Result<Extracted, ExtractionError> {
    let stripped = strip_code_fence(raw);
    if stripped.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let candidate = if stripped.starts_with('{') || stripped.starts_with('[') {
        stripped
    } else {
        find_fenced_block(stripped).unwrap_or(stripped)
    };

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(Extracted {
            value,
            method: ExtractionMethod::Direct,
        });
    }

    let start = candidate
        .find(['{', '['])
        .ok_or(ExtractionError::NoJson)?;
    let tail = &candidate[start..];

    if let Some(sliced) = slice_balanced(tail)
        && let Ok(value) = serde_json::from_str::<Value>(sliced)
    {
        return Ok(Extracted {
            value,
            method: ExtractionMethod::Sliced,
        });
    }

    let repaired = repair_json(tail);
    serde_json::from_str::<Value>(&repaired)
        .map(|value| Extracted {
            value,
            method: ExtractionMethod::Repaired,
        })
        .map_err(|e| ExtractionError::Unrepairable {
            reason: e.to_string(),
        })
}

/// Recover and deserialize into `T`.
///
/// # Errors
///
/// Any [`extract_json`] error, or `Shape` when the value does not match `T`.
pub fn extract_json_as<T: DeserializeOwned>(
    raw: &str,
) -> Result<(T, ExtractionMethod), ExtractionError> {
    let extracted = extract_json(raw)?;
    let parsed = serde_json::from_value(extracted.value).map_err(|e| ExtractionError::Shape {
        reason: e.to_string(),
    })?;
    Ok((parsed, extracted.method))
}

/// From an opening bracket, the text up to the last closer of the same kind.
fn slice_balanced(text: &str) -> Option<&str> {
    let closer = match text.as_bytes().first()? {
        b'{' => '}',
        b'[' => ']',
        _ => return None,
    };
    let end = text.rfind(closer)?;
    Some(&text[..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        let extracted = extract_json("{\"a\": 1}").unwrap();
        assert_eq!(extracted.value, json!({"a": 1}));
        assert_eq!(extracted.method, ExtractionMethod::Direct);
    }

    #[test]
    fn test_fenced_response_is_direct() {
        let extracted = extract_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(extracted.method, ExtractionMethod::Direct);
    }

    #[test]
    fn test_embedded_fence_with_prose() {
        let extracted = extract_json("Here is the outline:\n```json\n[1, 2]\n```\nDone.").unwrap();
        assert_eq!(extracted.value, json!([1, 2]));
    }

    #[test]
    fn test_prose_around_object_is_sliced() {
        let extracted = extract_json("Sure! {\"ready\": true} Let me know.").unwrap();
        assert_eq!(extracted.value, json!({"ready": true}));
        assert_eq!(extracted.method, ExtractionMethod::Sliced);
    }

    #[test]
    fn test_truncated_response_is_repaired() {
        let extracted = extract_json("```json\n{\"strengths\": [\"clear\", \"conc").unwrap();
        assert_eq!(extracted.value, json!({"strengths": ["clear"]}));
        assert!(extracted.method.is_repaired());
    }

    #[test]
    fn test_errors() {
        assert_eq!(extract_json("   "), Err(ExtractionError::Empty));
        assert_eq!(extract_json("no json here"), Err(ExtractionError::NoJson));
        assert!(matches!(
            extract_json("{\"a\": 1 \"b\": 2}"),
            Err(ExtractionError::Unrepairable { .. })
        ));
        // A dangling literal is cut back to the enclosing container.
        assert_eq!(extract_json("{\"a\": tru").unwrap().value, json!({}));
    }

    #[test]
    fn test_extract_as_reports_shape_errors() {
        #[derive(Debug, Deserialize)]
        struct Eval {
            needs_improvement: bool,
        }

        let (eval, method) = extract_json_as::<Eval>("{\"needs_improvement\": false}").unwrap();
        assert!(!eval.needs_improvement);
        assert_eq!(method, ExtractionMethod::Direct);

        assert!(matches!(
            extract_json_as::<Eval>("{\"other\": 1}"),
            Err(ExtractionError::Shape { .. })
        ));
    }
}
