//! Whole-document outline
//!
//! One call produces the outline for every section so the plan stays
//! coherent. Any section the response misses gets a generic fallback entry;
//! this stage degrades but never drops a section.

use draftsmith_blueprint::{Blueprint, Section, UserInputs};
use draftsmith_extraction::extract_json;
use draftsmith_llm::{CompletionClient, CompletionRequest, LlmError};
use draftsmith_utils::logging::log_degraded;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::context::truncate_for_prompt;
use crate::outcome::Outcome;
use crate::prompts::{JSON_ONLY_INSTRUCTIONS, or_placeholder, system_prompt};
use crate::settings::PipelineSettings;
use crate::usage::Usage;

pub const FALLBACK_KEY_POINTS: &[&str] = &["Key insight 1", "Key insight 2"];
pub const FALLBACK_DATA: &[&str] = &["Relevant metrics"];

const STAGE: &str = "skeleton";

/// Outline for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonEntry {
    #[serde(default, alias = "title")]
    pub purpose: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub data_to_include: Vec<String>,
    /// Set when this entry was synthesized instead of parsed
    #[serde(skip)]
    pub fallback: bool,
}

impl SkeletonEntry {
    /// The generic entry used when the outline has nothing for a section.
    #[must_use]
    pub fn fallback_for(section: &Section) -> Self {
        Self {
            purpose: section.description.clone(),
            key_points: FALLBACK_KEY_POINTS.iter().map(|s| (*s).to_string()).collect(),
            data_to_include: FALLBACK_DATA.iter().map(|s| (*s).to_string()).collect(),
            fallback: true,
        }
    }
}

/// Outline keyed by section id; always covers every blueprint section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skeleton {
    entries: BTreeMap<String, SkeletonEntry>,
}

impl Skeleton {
    #[must_use]
    pub fn get(&self, section_id: &str) -> Option<&SkeletonEntry> {
        self.entries.get(section_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Section ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Ids whose entry is a synthesized fallback.
    #[must_use]
    pub fn fallback_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.fallback)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Fallback entries for every section of `blueprint`.
    #[must_use]
    pub fn all_fallback(blueprint: &Blueprint) -> Self {
        Self {
            entries: blueprint
                .sections
                .iter()
                .map(|s| (s.id.clone(), SkeletonEntry::fallback_for(s)))
                .collect(),
        }
    }

    pub fn insert(&mut self, section_id: impl Into<String>, entry: SkeletonEntry) {
        self.entries.insert(section_id.into(), entry);
    }
}

/// Build a skeleton from a raw response, filling every gap.
///
/// Parse failures and missing ids produce fallback entries plus one
/// degradation reason each. Keys that are not blueprint section ids are
/// dropped.
#[must_use]
pub fn parse_skeleton(blueprint: &Blueprint, raw: &str) -> Outcome<Skeleton> {
    let mut reasons = Vec::new();

    let parsed: Option<serde_json::Map<String, Value>> = match extract_json(raw) {
        Ok(extracted) => {
            if extracted.method.is_repaired() {
                reasons.push("skeleton response was truncated and repaired".to_string());
            }
            match extracted.value {
                Value::Object(map) => Some(map),
                other => {
                    reasons.push(format!(
                        "skeleton response was not a JSON object (got {})",
                        json_kind(&other)
                    ));
                    None
                }
            }
        }
        Err(e) => {
            reasons.push(format!("skeleton response could not be parsed: {e}"));
            None
        }
    };

    let mut skeleton = Skeleton::default();
    for section in blueprint.sections_in_order() {
        let entry = parsed
            .as_ref()
            .and_then(|map| map.get(&section.id))
            .and_then(|v| serde_json::from_value::<SkeletonEntry>(v.clone()).ok());

        match entry {
            Some(mut entry) => {
                if entry.purpose.trim().is_empty() {
                    entry.purpose = section.description.clone();
                }
                skeleton.insert(section.id.clone(), entry);
            }
            None => {
                if parsed.is_some() {
                    reasons.push(format!(
                        "section '{}' missing from skeleton; using fallback outline",
                        section.id
                    ));
                }
                skeleton.insert(section.id.clone(), SkeletonEntry::fallback_for(section));
            }
        }
    }

    if let Some(map) = &parsed {
        for key in map.keys().filter(|k| blueprint.section(k).is_none()) {
            debug!(key = %key, "Dropping skeleton key that is not a section id");
        }
    }

    Outcome::from_reasons(skeleton, reasons)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct SkeletonGenerator<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
}

impl<'a> SkeletonGenerator<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Outline the whole document in one call.
    ///
    /// # Errors
    ///
    /// Only fatal backend errors (auth, quota, budget, misconfiguration)
    /// propagate. A transient failure degrades to an all-fallback skeleton.
    pub async fn generate(
        &self,
        blueprint: &Blueprint,
        context: &str,
        inputs: &UserInputs,
        usage: &mut Usage,
    ) -> Result<Outcome<Skeleton>, LlmError> {
        let section_count = u32::try_from(blueprint.sections.len()).unwrap_or(u32::MAX);
        let request = CompletionRequest::new(
            STAGE,
            system_prompt(blueprint),
            self.prompt(blueprint, context, inputs),
        )
        .temperature(self.settings.generation_temperature)
        .max_tokens(section_count.saturating_mul(300).clamp(1000, 4000));

        let completion = match self.client.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                usage.record_failed_call();
                if e.is_fatal() {
                    return Err(e);
                }
                let reason = format!("skeleton call failed ({e}); using fallback outline");
                log_degraded(STAGE, &reason);
                return Ok(Outcome::degraded(Skeleton::all_fallback(blueprint), reason));
            }
        };
        usage.record(&completion);

        let outcome = parse_skeleton(blueprint, &completion.content);
        for reason in outcome.reasons() {
            log_degraded(STAGE, reason);
        }
        info!(
            sections = outcome.value().len(),
            fallbacks = outcome.value().fallback_ids().len(),
            tokens_used = completion.tokens_used,
            "Skeleton generated"
        );
        Ok(outcome)
    }

    fn prompt(&self, blueprint: &Blueprint, context: &str, inputs: &UserInputs) -> String {
        let sections: Vec<String> = blueprint
            .sections_in_order()
            .iter()
            .map(|s| {
                let mut line = format!("- \"{}\" ({}): {}", s.id, s.title, s.description);
                for sub in &s.subsections {
                    line.push_str(&format!("\n    - {}: {}", sub.title, sub.description));
                }
                line
            })
            .collect();

        let ids: Vec<String> = blueprint
            .section_ids()
            .iter()
            .map(|id| format!("\"{id}\""))
            .collect();

        format!(
            r#"Create a unified outline for the whole document before any section is written.

# Sections

{}

# Facts provided by the user

{}

# Background context

{}

# Instructions

- Give every section a distinct purpose. Sections must not overlap or repeat each other's points.
- Use exactly these top-level keys and no others: {}.
- For each key return an object with "purpose" (one sentence), "key_points" (2-4 short strings) and "data_to_include" (facts from the user input that belong in that section).
- Only reference facts listed above.

Example shape:
{{"{}": {{"purpose": "...", "key_points": ["..."], "data_to_include": ["..."]}}}}{}"#,
            sections.join("\n"),
            or_placeholder(&inputs.grounding_text(), "(none)"),
            or_placeholder(
                truncate_for_prompt(context, self.settings.context_char_budget),
                "(none)"
            ),
            ids.join(", "),
            blueprint.section_ids().first().copied().unwrap_or("section_id"),
            JSON_ONLY_INSTRUCTIONS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_llm::ScriptedBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn blueprint() -> Blueprint {
        serde_json::from_value(serde_json::json!({
            "name": "memo",
            "sections": [
                {"id": "intro", "title": "Introduction", "description": "Why this memo exists", "order": 1},
                {"id": "body", "title": "Body", "description": "The argument", "order": 2},
                {"id": "conclusion", "title": "Conclusion", "description": "Next steps", "order": 3}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_complete_response() {
        let raw = r#"```json
{"intro": {"purpose": "Set context", "key_points": ["a"], "data_to_include": []},
 "body": {"title": "Argue", "key_points": ["b"]},
 "conclusion": {"purpose": "Close", "key_points": ["c"], "data_to_include": ["d"]}}
```"#;
        let outcome = parse_skeleton(&blueprint(), raw);
        assert!(!outcome.is_degraded(), "{:?}", outcome.reasons());
        let skeleton = outcome.value();
        assert_eq!(skeleton.len(), 3);
        assert_eq!(skeleton.get("body").unwrap().purpose, "Argue");
        assert!(skeleton.fallback_ids().is_empty());
    }

    #[test]
    fn test_missing_section_gets_fallback() {
        let raw = r#"{"intro": {"purpose": "Set context"}, "body": {"purpose": "Argue"}, "appendix": {}}"#;
        let outcome = parse_skeleton(&blueprint(), raw);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reasons().len(), 1);

        let skeleton = outcome.value();
        assert_eq!(skeleton.ids().collect::<Vec<_>>(), vec!["body", "conclusion", "intro"]);
        let fallback = skeleton.get("conclusion").unwrap();
        assert!(fallback.fallback);
        assert_eq!(fallback.purpose, "Next steps");
        assert_eq!(fallback.key_points, vec!["Key insight 1", "Key insight 2"]);
        assert_eq!(fallback.data_to_include, vec!["Relevant metrics"]);
    }

    #[test]
    fn test_garbage_response_falls_back_everywhere() {
        let outcome = parse_skeleton(&blueprint(), "I cannot help with that.");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().fallback_ids().len(), 3);
    }

    #[test]
    fn test_non_object_response_falls_back() {
        let outcome = parse_skeleton(&blueprint(), "[1, 2, 3]");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().len(), 3);
        assert!(outcome.reasons()[0].contains("array"));
    }

    #[test]
    fn test_empty_purpose_uses_description() {
        let raw = r#"{"intro": {"key_points": ["x"]}, "body": {"purpose": "b"}, "conclusion": {"purpose": "c"}}"#;
        let outcome = parse_skeleton(&blueprint(), raw);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value().get("intro").unwrap().purpose, "Why this memo exists");
    }

    #[tokio::test]
    async fn test_generate_prompt_lists_ids_and_degrades_on_transient_failure() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderOutage("503".into()));
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let generator = SkeletonGenerator::new(&client, &settings);
        let mut usage = Usage::default();

        let outcome = generator
            .generate(&blueprint(), "", &UserInputs::new(), &mut usage)
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().fallback_ids().len(), 3);
        assert_eq!(usage.calls, 1);

        let call = &backend.calls()[0];
        assert!(call.user.contains(r#""intro", "body", "conclusion""#));
        assert!(call.user.contains("must not overlap"));
    }

    #[tokio::test]
    async fn test_generate_propagates_fatal_errors() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderAuth("401".into()));
        let client = CompletionClient::new(backend, Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let result = SkeletonGenerator::new(&client, &settings)
            .generate(&blueprint(), "", &UserInputs::new(), &mut Usage::default())
            .await;
        assert!(matches!(result, Err(LlmError::ProviderAuth(_))));
    }
}
