//! User-supplied field values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values that mean "not provided yet" and must never be used as facts.
const PLACEHOLDERS: &[&str] = &["tbd", "n/a", "na", "todo", "-", "none", "unknown", "?"];

/// Field values keyed by input id, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInputs(BTreeMap<String, String>);

impl UserInputs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(id.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: UserInputs) {
        self.0.extend(other.0);
    }

    /// Whether a value is blank or a placeholder such as `TBD` or `[name]`.
    #[must_use]
    pub fn is_placeholder(value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return true;
        }
        if (trimmed.starts_with('[') && trimmed.ends_with(']'))
            || (trimmed.starts_with('<') && trimmed.ends_with('>'))
        {
            return true;
        }
        let lower = trimmed.to_ascii_lowercase();
        PLACEHOLDERS.contains(&lower.as_str())
    }

    /// Only the values that can be cited as facts.
    #[must_use]
    pub fn factual_grounding(&self) -> Vec<(&str, &str)> {
        self.iter()
            .filter(|(_, v)| !Self::is_placeholder(v))
            .map(|(k, v)| (k, v.trim()))
            .collect()
    }

    /// Factual grounding as a `- id: value` bullet list.
    #[must_use]
    pub fn grounding_text(&self) -> String {
        self.factual_grounding()
            .into_iter()
            .map(|(k, v)| format!("- {k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every value joined by newlines; the haystack for name checks.
    #[must_use]
    pub fn concatenated(&self) -> String {
        self.0.values().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
