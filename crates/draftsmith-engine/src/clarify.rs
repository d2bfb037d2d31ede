//! Clarifying questions and the step-back summary
//!
//! Before drafting, the user is asked a few questions about gaps in their
//! inputs. Their answers are folded into one strategic paragraph that every
//! section prompt carries as grounding.

use draftsmith_blueprint::{Blueprint, UserInputs};
use draftsmith_extraction::{extract_json, strip_code_fence};
use draftsmith_llm::{CompletionClient, CompletionRequest};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::log_degraded;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::context::truncate_for_prompt;
use crate::outcome::Outcome;
use crate::prompts::{JSON_ONLY_INSTRUCTIONS, or_placeholder, system_prompt};
use crate::settings::PipelineSettings;
use crate::usage::Usage;

const STAGE_QUESTIONS: &str = "clarify";
const STAGE_SUMMARY: &str = "step-back";

pub const MIN_QUESTIONS: usize = 3;
pub const MAX_QUESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub rationale: String,
}

/// A question paired with the user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingAnswer {
    pub question: String,
    pub answer: String,
}

/// Questions derived from the blueprint alone: unanswered required inputs
/// first, then one per section, at most [`MAX_QUESTIONS`].
#[must_use]
pub fn fallback_questions(blueprint: &Blueprint, inputs: &UserInputs) -> Vec<ClarifyingQuestion> {
    let missing_inputs = blueprint.required_inputs().into_iter().filter(|spec| {
        inputs
            .get(&spec.id)
            .is_none_or(|v| v.trim().is_empty() || UserInputs::is_placeholder(v))
    });

    let from_inputs = missing_inputs.map(|spec| ClarifyingQuestion {
        id: format!("input_{}", spec.id),
        question: format!("What is the {}?", spec.label.trim().to_lowercase()),
        rationale: format!("\"{}\" is required and has not been provided.", spec.label),
    });

    let from_sections = blueprint
        .sections_in_order()
        .into_iter()
        .map(|section| ClarifyingQuestion {
            id: format!("section_{}", section.id),
            question: format!(
                "What is the single most important point the {} section should make?",
                section.title
            ),
            rationale: "Sharpens the outline for this section.".to_string(),
        });

    from_inputs.chain(from_sections).take(MAX_QUESTIONS).collect()
}

/// Questions from a raw response: `{"questions": [...]}` or a bare array.
/// Blank questions are dropped and at most [`MAX_QUESTIONS`] are kept.
#[must_use]
pub fn parse_questions(raw: &str) -> Option<Vec<ClarifyingQuestion>> {
    let value = extract_json(raw).ok()?.value;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let questions: Vec<ClarifyingQuestion> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(question) => Some((String::new(), question, String::new())),
            Value::Object(obj) => {
                let field = |key: &str| {
                    obj.get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string()
                };
                Some((field("id"), field("question"), field("rationale")))
            }
            _ => None,
        })
        .filter(|(_, question, _)| !question.trim().is_empty())
        .take(MAX_QUESTIONS)
        .enumerate()
        .map(|(i, (id, question, rationale))| ClarifyingQuestion {
            id: if id.is_empty() { format!("q{}", i + 1) } else { id },
            question: question.trim().to_string(),
            rationale,
        })
        .collect();

    if questions.is_empty() { None } else { Some(questions) }
}

pub struct ClarificationStage<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
}

impl<'a> ClarificationStage<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Ask for 3-5 clarifying questions.
    ///
    /// # Errors
    ///
    /// Only fatal backend errors propagate; anything else degrades to
    /// [`fallback_questions`].
    pub async fn questions(
        &self,
        blueprint: &Blueprint,
        inputs: &UserInputs,
        context: &str,
        usage: &mut Usage,
    ) -> Result<Outcome<Vec<ClarifyingQuestion>>, DraftError> {
        let request = CompletionRequest::new(
            STAGE_QUESTIONS,
            system_prompt(blueprint),
            self.questions_prompt(blueprint, inputs, context),
        )
        .temperature(self.settings.generation_temperature)
        .max_tokens(1000);

        let reason = match self.client.complete(request).await {
            Ok(completion) => {
                usage.record(&completion);
                match parse_questions(&completion.content) {
                    Some(questions) => {
                        info!(questions = questions.len(), "Clarifying questions generated");
                        return Ok(Outcome::Complete(questions));
                    }
                    None => "clarifying questions could not be parsed; using defaults".to_string(),
                }
            }
            Err(e) => {
                usage.record_failed_call();
                if e.is_fatal() {
                    return Err(e.into());
                }
                format!("clarifying questions call failed ({e}); using defaults")
            }
        };

        log_degraded(STAGE_QUESTIONS, &reason);
        Ok(Outcome::degraded(fallback_questions(blueprint, inputs), reason))
    }

    /// Fold the answers into one strategic-summary paragraph.
    ///
    /// # Errors
    ///
    /// Only fatal backend errors propagate. An empty or failed response
    /// degrades to the answers joined as sentences.
    pub async fn step_back_summary(
        &self,
        blueprint: &Blueprint,
        inputs: &UserInputs,
        answers: &[ClarifyingAnswer],
        context: &str,
        usage: &mut Usage,
    ) -> Result<Outcome<String>, DraftError> {
        let request = CompletionRequest::new(
            STAGE_SUMMARY,
            system_prompt(blueprint),
            self.summary_prompt(blueprint, inputs, answers, context),
        )
        .temperature(self.settings.generation_temperature)
        .max_tokens(600);

        let reason = match self.client.complete(request).await {
            Ok(completion) => {
                usage.record(&completion);
                let paragraph = single_paragraph(strip_code_fence(&completion.content));
                if !paragraph.is_empty() {
                    return Ok(Outcome::Complete(paragraph));
                }
                "step-back summary was empty; using the raw answers".to_string()
            }
            Err(e) => {
                usage.record_failed_call();
                if e.is_fatal() {
                    return Err(e.into());
                }
                format!("step-back summary call failed ({e}); using the raw answers")
            }
        };

        log_degraded(STAGE_SUMMARY, &reason);
        let fallback = answers
            .iter()
            .filter(|a| !a.answer.trim().is_empty())
            .map(|a| format!("{} {}", a.question.trim(), a.answer.trim()))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Outcome::degraded(fallback, reason))
    }

    fn questions_prompt(&self, blueprint: &Blueprint, inputs: &UserInputs, context: &str) -> String {
        let sections: Vec<String> = blueprint
            .sections_in_order()
            .iter()
            .map(|s| format!("- {}: {}", s.title, s.description))
            .collect();

        format!(
            r#"Before drafting the {}, identify what is still unclear.

# Planned sections

{}

# What the user has provided

{}

# Background context

{}

Ask {MIN_QUESTIONS} to {MAX_QUESTIONS} short questions whose answers would most improve the document. Do not ask about anything already answered above.

Respond as {{"questions": [{{"id": "q1", "question": "...", "rationale": "why it matters"}}]}}.{}"#,
            blueprint.name,
            sections.join("\n"),
            or_placeholder(&inputs.grounding_text(), "(nothing yet)"),
            or_placeholder(
                truncate_for_prompt(context, self.settings.context_char_budget),
                "(none)"
            ),
            JSON_ONLY_INSTRUCTIONS,
        )
    }

    fn summary_prompt(
        &self,
        blueprint: &Blueprint,
        inputs: &UserInputs,
        answers: &[ClarifyingAnswer],
        context: &str,
    ) -> String {
        let qa: Vec<String> = answers
            .iter()
            .map(|a| format!("Q: {}\nA: {}", a.question.trim(), a.answer.trim()))
            .collect();

        format!(
            r#"Step back from the details and write one paragraph (3-5 sentences) stating the strategic intent of this {}: what it must achieve, for whom, and the facts it rests on.

# Inputs

{}

# Clarifying answers

{}

# Background context

{}

Use only the facts above. Return the paragraph only."#,
            blueprint.name,
            or_placeholder(&inputs.grounding_text(), "(none)"),
            or_placeholder(&qa.join("\n\n"), "(none)"),
            or_placeholder(
                truncate_for_prompt(context, self.settings.context_char_budget),
                "(none)"
            ),
        )
    }
}

/// Collapse whitespace so the summary is a single paragraph.
fn single_paragraph(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_llm::{LlmError, ScriptedBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn blueprint() -> Blueprint {
        serde_json::from_value(serde_json::json!({
            "name": "charter",
            "sections": [
                {"id": "scope", "title": "Scope", "order": 2},
                {"id": "goals", "title": "Goals", "order": 1},
                {"id": "risks", "title": "Risks", "order": 3},
                {"id": "team", "title": "Team", "order": 4},
                {"id": "budget", "title": "Budget", "order": 5}
            ],
            "inputs": [
                {"id": "name", "label": "Project Name", "required": true},
                {"id": "sponsor", "label": "Sponsor", "required": true},
                {"id": "notes", "label": "Notes"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_fallback_questions_prefer_missing_inputs() {
        let inputs: UserInputs = [("name", "Atlas"), ("sponsor", "TBD")].into_iter().collect();
        let questions = fallback_questions(&blueprint(), &inputs);
        assert_eq!(questions.len(), MAX_QUESTIONS);
        assert_eq!(questions[0].id, "input_sponsor");
        assert_eq!(questions[0].question, "What is the sponsor?");
        assert_eq!(questions[1].id, "section_goals");
        assert_eq!(questions[4].id, "section_team");
    }

    #[test]
    fn test_parse_questions_shapes() {
        let wrapped = r#"{"questions": [{"id": "a", "question": "Who signs off?", "rationale": "r"}, {"question": "  "}]}"#;
        let parsed = parse_questions(wrapped).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "a");

        let bare = r#"["One?", "Two?", "Three?", "Four?", "Five?", "Six?"]"#;
        let parsed = parse_questions(bare).unwrap();
        assert_eq!(parsed.len(), MAX_QUESTIONS);
        assert_eq!(parsed[2].id, "q3");

        assert!(parse_questions("no questions here").is_none());
        assert!(parse_questions(r#"{"questions": []}"#).is_none());
    }

    #[tokio::test]
    async fn test_questions_degrade_on_garbage() {
        let backend = Arc::new(ScriptedBackend::with_replies(["I have no questions."]));
        let client = CompletionClient::new(backend, Duration::from_secs(5));
        let settings = PipelineSettings::default();

        let outcome = ClarificationStage::new(&client, &settings)
            .questions(&blueprint(), &UserInputs::new(), "", &mut Usage::default())
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value()[0].id, "input_name");
    }

    #[tokio::test]
    async fn test_step_back_summary_is_one_paragraph() {
        let backend = Arc::new(ScriptedBackend::with_replies([
            "Atlas exists to cut onboarding time.\n\nIt serves new customers.",
        ]));
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let answers = vec![ClarifyingAnswer {
            question: "Who is it for?".into(),
            answer: "New customers".into(),
        }];

        let outcome = ClarificationStage::new(&client, &settings)
            .step_back_summary(&blueprint(), &UserInputs::new(), &answers, "", &mut Usage::default())
            .await
            .unwrap();
        assert_eq!(
            outcome.value(),
            "Atlas exists to cut onboarding time. It serves new customers."
        );
        assert!(backend.calls()[0].user.contains("Q: Who is it for?\nA: New customers"));
    }

    #[tokio::test]
    async fn test_step_back_summary_falls_back_to_answers() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderOutage("503".into()));
        let client = CompletionClient::new(backend, Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let answers = vec![ClarifyingAnswer {
            question: "Deadline?".into(),
            answer: "March".into(),
        }];

        let outcome = ClarificationStage::new(&client, &settings)
            .step_back_summary(&blueprint(), &UserInputs::new(), &answers, "", &mut Usage::default())
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value(), "Deadline? March");
    }
}
