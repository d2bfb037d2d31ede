//! Self-critique loop for distilling long summaries
//!
//! Distill once into 4-6 sentences, then alternate evaluate and refine
//! calls. The loop stops when an evaluation says no improvement is needed,
//! when the evaluation cannot be parsed, or after `max_iterations` refine
//! passes.

use draftsmith_extraction::{extract_json_as, strip_code_fence};
use draftsmith_llm::{CompletionClient, CompletionRequest};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::log_degraded;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::outcome::Outcome;
use crate::prompts::JSON_ONLY_INSTRUCTIONS;
use crate::settings::PipelineSettings;
use crate::usage::Usage;

const STAGE_DISTILL: &str = "distill";
const STAGE_EVALUATE: &str = "distill-evaluate";
const STAGE_REFINE: &str = "distill-refine";

const SYSTEM_PROMPT: &str = "You are an analyst who writes short, precise executive summaries.";

pub const MIN_SENTENCES: usize = 4;
pub const MAX_SENTENCES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// An evaluation reported `needs_improvement = false`
    Satisfied,
    MaxIterations,
    /// An evaluation response could not be parsed
    EvaluationUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistillResult {
    pub text: String,
    /// Refine passes applied after the initial distillation
    pub iterations: u32,
    pub stop_reason: StopReason,
    pub feedback: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    needs_improvement: bool,
    #[serde(default)]
    feedback: String,
}

/// Sentences in `text`, counting runs ending in `.`, `!` or `?`.
#[must_use]
pub fn sentence_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_sentence = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' | '!' | '?' => {
                let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
                if in_sentence && at_boundary {
                    count += 1;
                    in_sentence = false;
                }
            }
            c if !c.is_whitespace() => in_sentence = true,
            _ => {}
        }
    }
    if in_sentence {
        count += 1;
    }
    count
}

pub struct SelfRefineAgent<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
}

impl<'a> SelfRefineAgent<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Distill `summary` and improve it until an evaluation is satisfied.
    ///
    /// # Errors
    ///
    /// Any backend error that survived the client's retries.
    pub async fn distill(
        &self,
        summary: &str,
        max_iterations: u32,
        usage: &mut Usage,
    ) -> Result<Outcome<DistillResult>, DraftError> {
        let mut reasons = Vec::new();
        let mut text = self
            .call(
                STAGE_DISTILL,
                format!(
                    "Condense the analysis below into {MIN_SENTENCES} to {MAX_SENTENCES} sentences. \
                     Keep the conclusions and the figures that support them. Return only the sentences.\n\n# Analysis\n\n{}",
                    summary.trim()
                ),
                usage,
            )
            .await?;
        if text.is_empty() {
            let reason = "distillation returned no text; keeping the original summary".to_string();
            log_degraded(STAGE_DISTILL, &reason);
            reasons.push(reason);
            text = summary.trim().to_string();
        }

        let mut iterations = 0;
        let mut feedback_history = Vec::new();
        let mut stop_reason = StopReason::MaxIterations;

        while iterations < max_iterations {
            let raw = self
                .call(STAGE_EVALUATE, self.evaluate_prompt(summary, &text), usage)
                .await?;
            let evaluation = match extract_json_as::<Evaluation>(&raw) {
                Ok((evaluation, _)) => evaluation,
                Err(e) => {
                    let reason = format!("self-critique response could not be parsed: {e}");
                    log_degraded(STAGE_EVALUATE, &reason);
                    reasons.push(reason);
                    stop_reason = StopReason::EvaluationUnavailable;
                    break;
                }
            };
            debug!(
                iteration = iterations,
                needs_improvement = evaluation.needs_improvement,
                sentences = sentence_count(&text),
                "Self-critique evaluated"
            );
            if !evaluation.needs_improvement {
                stop_reason = StopReason::Satisfied;
                break;
            }

            let feedback = evaluation.feedback.trim().to_string();
            let revised = self
                .call(
                    STAGE_REFINE,
                    format!(
                        "Rewrite the summary to address the feedback. Keep it to {MIN_SENTENCES} to {MAX_SENTENCES} sentences and return only the sentences.\n\n# Feedback\n\n{}\n\n# Summary\n\n{}\n\n# Original analysis\n\n{}",
                        or_default_feedback(&feedback),
                        text,
                        summary.trim()
                    ),
                    usage,
                )
                .await?;
            if !revised.is_empty() {
                text = revised;
            }
            feedback_history.push(feedback);
            iterations += 1;
        }

        info!(
            iterations,
            stop_reason = ?stop_reason,
            sentences = sentence_count(&text),
            "Distillation finished"
        );
        Ok(Outcome::from_reasons(
            DistillResult {
                text,
                iterations,
                stop_reason,
                feedback: feedback_history,
            },
            reasons,
        ))
    }

    fn evaluate_prompt(&self, summary: &str, candidate: &str) -> String {
        format!(
            r#"Evaluate this distilled summary against the original analysis.

It must be {MIN_SENTENCES} to {MAX_SENTENCES} sentences (it currently has {}), keep the key conclusions, and state nothing the analysis does not support.

# Distilled summary

{}

# Original analysis

{}

Respond as {{"needs_improvement": true|false, "feedback": "what to change, or empty"}}.{}"#,
            sentence_count(candidate),
            candidate,
            summary.trim(),
            JSON_ONLY_INSTRUCTIONS
        )
    }

    async fn call(&self, stage: &str, user: String, usage: &mut Usage) -> Result<String, DraftError> {
        let request = CompletionRequest::new(stage, SYSTEM_PROMPT, user)
            .temperature(self.settings.refinement_temperature)
            .max_tokens(1000);
        match self.client.complete(request).await {
            Ok(completion) => {
                usage.record(&completion);
                Ok(strip_code_fence(&completion.content).trim().to_string())
            }
            Err(e) => {
                usage.record_failed_call();
                Err(e.into())
            }
        }
    }
}

fn or_default_feedback(feedback: &str) -> &str {
    if feedback.is_empty() {
        "Make it tighter and more specific."
    } else {
        feedback
    }
}
