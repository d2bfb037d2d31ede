//! Rubric scoring
//!
//! One completion call scores the whole document against the blueprint
//! rubric. The response goes through tolerant JSON extraction; when nothing
//! usable comes back the result is an explicit "verification unavailable"
//! value with no scores, never an error.

use draftsmith_blueprint::{Blueprint, Rubric, UserInputs};
use draftsmith_extraction::extract_json;
use draftsmith_llm::{CompletionClient, CompletionRequest};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::log_degraded;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::context::truncate_for_prompt;
use crate::outcome::Outcome;
use crate::prompts::{JSON_ONLY_INSTRUCTIONS, or_placeholder, system_prompt};
use crate::settings::PipelineSettings;
use crate::usage::Usage;

const STAGE: &str = "verify";

/// Overall score at or above which a document is ready for approval.
pub const READY_THRESHOLD: f64 = 4.0;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

pub const UNPARSEABLE_STRENGTH: &str =
    "Unable to parse verification response. Re-run verification or review the document manually.";

/// Label for a 1-5 score.
#[must_use]
pub fn score_level(score: u8) -> &'static str {
    match score {
        5.. => "Excellent",
        4 => "Good",
        3 => "Satisfactory",
        2 => "Needs Improvement",
        _ => "Poor",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub id: String,
    pub name: String,
    pub score: u8,
    pub level: String,
    pub feedback: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Weighted mean of the criterion scores on the 1-5 scale; 0 when no
    /// criterion was scored
    pub overall_score: f64,
    pub scores: Vec<CriterionScore>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub specific_improvements: Vec<String>,
    pub ready_for_approval: bool,
}

impl VerificationResult {
    /// Result used when the response could not be parsed at all.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            overall_score: 0.0,
            scores: Vec::new(),
            strengths: vec![UNPARSEABLE_STRENGTH.to_string()],
            weaknesses: Vec::new(),
            specific_improvements: Vec::new(),
            ready_for_approval: false,
        }
    }

    /// Build a result from scores, deriving the overall score and readiness.
    #[must_use]
    pub fn from_scores(
        scores: Vec<CriterionScore>,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        specific_improvements: Vec<String>,
    ) -> Self {
        let overall_score = compute_overall(&scores);
        Self {
            overall_score,
            ready_for_approval: overall_score >= READY_THRESHOLD,
            scores,
            strengths,
            weaknesses,
            specific_improvements,
        }
    }

    /// No scores means verification did not happen, not that the document
    /// failed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.scores.is_empty()
    }
}

/// Weighted mean of `scores`, or 0 when there are none.
#[must_use]
pub fn compute_overall(scores: &[CriterionScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        let sum: f64 = scores.iter().map(|s| f64::from(s.score)).sum();
        return sum / scores.len() as f64;
    }
    let weighted: f64 = scores
        .iter()
        .map(|s| f64::from(s.score) * s.weight)
        .sum();
    weighted / total_weight
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    let rounded = raw.round().clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE));
    // In range 1..=5 after the clamp.
    rounded as u8
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// `(criterion id, raw score, feedback)` triples from either an array of
/// objects or an object keyed by criterion id.
fn raw_scores(value: &Value) -> Vec<(String, f64, String)> {
    let feedback_of = |obj: &serde_json::Map<String, Value>| {
        ["feedback", "justification", "comment"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|obj| {
                let id = ["id", "criterion_id", "criterion"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))?;
                let score = obj.get("score").and_then(number_from)?;
                Some((id.to_string(), score, feedback_of(obj)))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(id, v)| match v {
                Value::Object(obj) => {
                    let score = obj.get("score").and_then(number_from)?;
                    Some((id.clone(), score, feedback_of(obj)))
                }
                other => number_from(other).map(|score| (id.clone(), score, String::new())),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Turn a raw verifier response into a result.
///
/// Scores for ids outside the rubric are ignored; each criterion is scored
/// at most once. Unparseable text yields [`VerificationResult::unavailable`].
#[must_use]
pub fn parse_verification(rubric: &Rubric, raw: &str) -> Outcome<VerificationResult> {
    let extracted = match extract_json(raw) {
        Ok(extracted) => extracted,
        Err(e) => {
            return Outcome::degraded(
                VerificationResult::unavailable(),
                format!("verification response could not be parsed: {e}"),
            );
        }
    };

    let mut reasons = Vec::new();
    if extracted.method.is_repaired() {
        reasons.push("verification response was truncated and repaired".to_string());
    }
    let Value::Object(root) = extracted.value else {
        return Outcome::degraded(
            VerificationResult::unavailable(),
            "verification response was not a JSON object",
        );
    };

    let mut scores: Vec<CriterionScore> = Vec::new();
    for (id, raw_score, feedback) in root.get("scores").map(raw_scores).unwrap_or_default() {
        let Some(criterion) = rubric.criterion(&id) else {
            debug!(criterion = %id, "Ignoring score for unknown criterion");
            continue;
        };
        if scores.iter().any(|s| s.id == criterion.id) {
            continue;
        }
        let score = clamp_score(raw_score);
        scores.push(CriterionScore {
            id: criterion.id.clone(),
            name: criterion.name.clone(),
            score,
            level: score_level(score).to_string(),
            feedback,
            weight: criterion.effective_weight(),
        });
    }

    // Rubric order, not response order.
    scores.sort_by_key(|s| {
        rubric
            .criteria
            .iter()
            .position(|c| c.id == s.id)
            .unwrap_or(usize::MAX)
    });

    if scores.is_empty() {
        reasons.push("verification response scored no rubric criteria".to_string());
    }

    let result = VerificationResult::from_scores(
        scores,
        string_list(root.get("strengths")),
        string_list(root.get("weaknesses")),
        string_list(
            root.get("specific_improvements")
                .or_else(|| root.get("improvements")),
        ),
    );
    Outcome::from_reasons(result, reasons)
}

pub struct Verifier<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
}

impl<'a> Verifier<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Score `document` against the blueprint rubric.
    ///
    /// # Errors
    ///
    /// `BlueprintError::MissingRubric` when the blueprint has no rubric, and
    /// any backend error that survived the client's retries.
    pub async fn verify(
        &self,
        blueprint: &Blueprint,
        document: &str,
        context: &str,
        inputs: &UserInputs,
        usage: &mut Usage,
    ) -> Result<Outcome<VerificationResult>, DraftError> {
        let rubric = blueprint.rubric()?;

        let request = CompletionRequest::new(
            STAGE,
            system_prompt(blueprint),
            self.prompt(blueprint, rubric, document, context, inputs),
        )
        .temperature(self.settings.verification_temperature)
        .max_tokens(self.settings.verification_max_tokens);

        let completion = match self.client.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                usage.record_failed_call();
                return Err(e.into());
            }
        };
        usage.record(&completion);
        if completion.is_truncated() {
            debug!("Verification response hit the token limit");
        }

        let outcome = parse_verification(rubric, &completion.content);
        for reason in outcome.reasons() {
            log_degraded(STAGE, reason);
        }
        let result = outcome.value();
        info!(
            overall_score = result.overall_score,
            criteria = result.scores.len(),
            ready = result.ready_for_approval,
            tokens_used = completion.tokens_used,
            "Verification finished"
        );
        Ok(outcome)
    }

    fn prompt(
        &self,
        blueprint: &Blueprint,
        rubric: &Rubric,
        document: &str,
        context: &str,
        inputs: &UserInputs,
    ) -> String {
        let criteria: Vec<String> = rubric
            .criteria
            .iter()
            .map(|c| {
                format!(
                    "- \"{}\" {} (weight {}): {}",
                    c.id,
                    c.name,
                    c.effective_weight(),
                    c.description
                )
            })
            .collect();

        let questions = if blueprint.verification_questions.is_empty() {
            String::new()
        } else {
            let list: Vec<String> = blueprint
                .verification_questions
                .iter()
                .map(|q| format!("- {q}"))
                .collect();
            format!("\n# Questions the document must answer\n\n{}\n", list.join("\n"))
        };

        format!(
            r#"Score the following {} against the rubric. Use whole numbers from 1 (poor) to 5 (excellent) for each criterion.

# Rubric

{}
{}
# Facts provided by the user

{}

# Background context

{}

# Document

{}

# Response format

{{"scores": [{{"id": "<criterion id>", "score": 1-5, "feedback": "one or two sentences"}}],
 "strengths": ["..."], "weaknesses": ["..."], "specific_improvements": ["concrete, actionable edits"]}}

Score every criterion exactly once and use the criterion ids shown above.{}"#,
            blueprint.name,
            criteria.join("\n"),
            questions,
            or_placeholder(&inputs.grounding_text(), "(none)"),
            or_placeholder(
                truncate_for_prompt(context, self.settings.verifier_context_chars),
                "(none)"
            ),
            document.trim(),
            JSON_ONLY_INSTRUCTIONS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_blueprint::Criterion;
    use draftsmith_llm::{LlmError, ScriptedBackend, ScriptedReply};
    use draftsmith_utils::error::BlueprintError;
    use std::sync::Arc;
    use std::time::Duration;

    fn rubric() -> Rubric {
        Rubric {
            criteria: vec![
                Criterion {
                    id: "clarity".into(),
                    name: "Clarity".into(),
                    weight: Some(2.0),
                    description: String::new(),
                },
                Criterion {
                    id: "evidence".into(),
                    name: "Evidence".into(),
                    weight: None,
                    description: String::new(),
                },
            ],
            passing_score: 4.0,
        }
    }

    fn blueprint(with_rubric: bool) -> Blueprint {
        let mut bp: Blueprint = serde_json::from_value(serde_json::json!({
            "name": "memo",
            "sections": [{"id": "a", "title": "A", "order": 1}],
            "verification_questions": ["Is the ask explicit?"]
        }))
        .unwrap();
        if with_rubric {
            bp.rubric = Some(rubric());
        }
        bp
    }

    #[test]
    fn test_levels() {
        assert_eq!(score_level(5), "Excellent");
        assert_eq!(score_level(4), "Good");
        assert_eq!(score_level(3), "Satisfactory");
        assert_eq!(score_level(2), "Needs Improvement");
        assert_eq!(score_level(1), "Poor");
    }

    #[test]
    fn test_weighted_overall() {
        let raw = r#"{"scores": [
            {"id": "clarity", "score": 5, "feedback": "Crisp"},
            {"id": "evidence", "score": 2, "feedback": "Thin"}
        ], "strengths": ["Short"], "weaknesses": ["No data"], "specific_improvements": ["Add figures"]}"#;
        let outcome = parse_verification(&rubric(), raw);
        assert!(!outcome.is_degraded());
        let result = outcome.value();
        assert!((result.overall_score - 4.0).abs() < 1e-9);
        assert!(result.ready_for_approval);
        assert_eq!(result.scores[1].level, "Needs Improvement");
        assert!((result.scores[1].weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.specific_improvements, vec!["Add figures"]);
    }

    #[test]
    fn test_scores_clamped_and_unknown_ids_ignored() {
        let raw = r#"{"scores": {"clarity": {"score": 9}, "evidence": "0", "style": 5}}"#;
        let result = parse_verification(&rubric(), raw).into_value();
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.scores[0].score, 5);
        assert_eq!(result.scores[1].score, 1);
        assert!((result.overall_score - 11.0 / 3.0).abs() < 1e-9);
        assert!(!result.ready_for_approval);
    }

    #[test]
    fn test_truncated_response_is_repaired() {
        let raw = r#"```json
{"scores": [{"id": "clarity", "score": 4, "feedback": "Good"}, {"id": "evidence", "score": 4, "feedback": "Solid"}], "strengths": ["Clear ask", "Good fl"#;
        let outcome = parse_verification(&rubric(), raw);
        assert!(outcome.is_degraded());
        let result = outcome.value();
        assert_eq!(result.scores.len(), 2);
        assert!(result.ready_for_approval);
    }

    #[test]
    fn test_unparseable_is_unavailable() {
        let outcome = parse_verification(&rubric(), "The document looks great overall!");
        assert!(outcome.is_degraded());
        let result = outcome.value();
        assert!(!result.is_available());
        assert_eq!(result.overall_score, 0.0);
        assert!(!result.ready_for_approval);
        assert!(result.strengths[0].starts_with("Unable to parse verification response"));
    }

    #[tokio::test]
    async fn test_missing_rubric_is_configuration_error() {
        let backend = Arc::new(ScriptedBackend::new());
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let result = Verifier::new(&client, &settings)
            .verify(&blueprint(false), "doc", "", &UserInputs::new(), &mut Usage::default())
            .await;
        assert!(matches!(
            result,
            Err(DraftError::Blueprint(BlueprintError::MissingRubric { .. }))
        ));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_single_call_with_rubric_in_prompt() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(ScriptedReply::Truncated(
            r#"{"scores": [{"id": "clarity", "score": 3}"#.to_string(),
        ));
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let mut usage = Usage::default();

        let outcome = Verifier::new(&client, &settings)
            .verify(&blueprint(true), "# A\n\nBody", "", &UserInputs::new(), &mut usage)
            .await
            .unwrap();
        assert_eq!(outcome.value().scores.len(), 1);
        assert_eq!(usage.calls, 1);

        let call = &backend.calls()[0];
        assert_eq!(call.stage, "verify");
        assert!(call.user.contains("\"clarity\" Clarity (weight 2)"));
        assert!(call.user.contains("Is the ask explicit?"));
        assert_eq!(call.max_tokens, Some(settings.verification_max_tokens));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderOutage("502".into()));
        let client = CompletionClient::new(backend, Duration::from_secs(5));
        let settings = PipelineSettings::default();
        let result = Verifier::new(&client, &settings)
            .verify(&blueprint(true), "doc", "", &UserInputs::new(), &mut Usage::default())
            .await;
        assert!(matches!(result, Err(DraftError::Llm(_))));
    }
}
