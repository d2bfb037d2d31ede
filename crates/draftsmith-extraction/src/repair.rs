//! Bracket-balance repair for truncated JSON
//!
//! A response cut off by the token limit usually ends mid-string or
//! mid-value. Repair walks the text once, remembers the last position where
//! everything before it is a complete prefix, cuts there and closes every
//! container still open at that point.

/// Repair truncated JSON.
///
/// Valid JSON is returned unchanged. Otherwise trailing commas outside
/// strings are removed, the text is cut at the last safe point and the
/// open brackets and braces are closed in reverse order. The result is not
/// guaranteed to parse; callers check.
#[must_use]
pub fn repair_json(text: &str) -> String {
    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        return text.to_string();
    }

    let cleaned = strip_trailing_commas(text);
    let Some(cut) = last_safe_cut(&cleaned) else {
        return cleaned;
    };

    let mut repaired = cleaned[..cut.offset].trim_end().to_string();
    for open in cut.stack.iter().rev() {
        repaired.push(match open {
            b'{' => '}',
            _ => ']',
        });
    }
    repaired
}

/// Remove commas that directly precede `}` or `]`, ignoring string content.
#[must_use]
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[derive(Debug, Clone)]
struct Cut {
    /// Byte offset; everything before it is kept
    offset: usize,
    /// Containers open at `offset`, outermost first
    stack: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    open: u8,
    /// Inside an object, whether the next string is a value rather than a key
    expect_value: bool,
}

/// Find the last offset at which the prefix is complete JSON modulo closers.
fn last_safe_cut(text: &str) -> Option<Cut> {
    let bytes = text.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_value = false;
    let mut best: Option<Cut> = None;

    let snapshot = |offset: usize, stack: &[Frame]| Cut {
        offset,
        stack: stack.iter().map(|f| f.open).collect(),
    };

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                if string_is_value && !stack.is_empty() {
                    best = Some(snapshot(i + 1, &stack));
                }
            }
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                string_is_value = match stack.last() {
                    Some(frame) if frame.open == b'{' => frame.expect_value,
                    _ => true,
                };
            }
            b'{' | b'[' => {
                stack.push(Frame {
                    open: b,
                    expect_value: false,
                });
                best = Some(snapshot(i + 1, &stack));
            }
            b'}' | b']' => {
                stack.pop();
                if stack.is_empty() {
                    // Top-level value closed; nothing after it matters.
                    return Some(snapshot(i + 1, &stack));
                }
                best = Some(snapshot(i + 1, &stack));
            }
            b':' => {
                if let Some(frame) = stack.last_mut() {
                    frame.expect_value = true;
                }
            }
            b',' => {
                // The value before this comma is complete.
                if let Some(frame) = stack.last_mut() {
                    let cut_here = frame.open == b'[' || frame.expect_value;
                    frame.expect_value = false;
                    if cut_here {
                        best = Some(snapshot(i, &stack));
                    }
                }
            }
            _ => {}
        }
    }

    best
}
