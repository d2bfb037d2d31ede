//! Whole-document refinement
//!
//! Each iteration sends the current document with the instruction list and
//! replaces the working copy with the response. Nothing is checked per
//! iteration; run the verifier afterwards to judge the result.

use draftsmith_extraction::strip_code_fence;
use draftsmith_llm::{CompletionClient, CompletionRequest};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::log_degraded;
use draftsmith_utils::text::{estimate_tokens, word_count};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::truncate_for_prompt;
use crate::outcome::Outcome;
use crate::prompts::or_placeholder;
use crate::settings::PipelineSettings;
use crate::usage::Usage;
use crate::verifier::{READY_THRESHOLD, VerificationResult};

const STAGE: &str = "refine";

const REFINE_SYSTEM_PROMPT: &str = "You are a senior editor revising business documents. \
You make the requested changes and keep everything else intact.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementResult {
    pub refined_text: String,
    pub summary: String,
    /// Iterations that produced a replacement document
    pub iterations: u32,
    pub tokens: u64,
}

/// Revision instructions derived from a verification result: concrete
/// improvements first, then weaknesses, then feedback on criteria scored
/// below the ready threshold.
#[must_use]
pub fn instructions_from_verification(result: &VerificationResult) -> Vec<String> {
    let mut instructions: Vec<String> = Vec::new();
    let mut push = |text: String| {
        if !text.trim().is_empty() && !instructions.contains(&text) {
            instructions.push(text);
        }
    };

    for improvement in &result.specific_improvements {
        push(improvement.trim().to_string());
    }
    for weakness in &result.weaknesses {
        push(format!("Address this weakness: {}", weakness.trim()));
    }
    for score in &result.scores {
        if f64::from(score.score) < READY_THRESHOLD && !score.feedback.is_empty() {
            push(format!(
                "Improve {} (scored {}/5): {}",
                score.name, score.score, score.feedback
            ));
        }
    }
    instructions
}

pub struct RefinementStage<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
}

impl<'a> RefinementStage<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Revise `document` up to `max_iterations` times (at least once).
    ///
    /// An empty response leaves the working document unchanged, stops the
    /// loop and degrades the outcome.
    ///
    /// # Errors
    ///
    /// Any backend error that survived the client's retries.
    pub async fn refine(
        &self,
        document: &str,
        instructions: &[String],
        context: &str,
        max_iterations: u32,
        usage: &mut Usage,
    ) -> Result<Outcome<RefinementResult>, DraftError> {
        let max_iterations = max_iterations.max(1);
        let mut working = document.trim().to_string();
        let mut iterations = 0;
        let mut tokens = 0;
        let mut reasons = Vec::new();

        for iteration in 0..max_iterations {
            let request = CompletionRequest::new(
                STAGE,
                REFINE_SYSTEM_PROMPT,
                self.prompt(&working, instructions, context),
            )
            .temperature(self.settings.refinement_temperature)
            .max_tokens(refine_max_tokens(&working));

            let completion = match self.client.complete(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    usage.record_failed_call();
                    return Err(e.into());
                }
            };
            usage.record(&completion);
            tokens += completion.tokens_used;

            let revised = strip_code_fence(&completion.content).trim();
            if revised.is_empty() {
                let reason = format!("refinement iteration {} returned no text", iteration + 1);
                log_degraded(STAGE, &reason);
                reasons.push(reason);
                break;
            }
            if completion.is_truncated() {
                let reason = format!(
                    "refinement iteration {} hit the token limit; the document may be cut short",
                    iteration + 1
                );
                log_degraded(STAGE, &reason);
                reasons.push(reason);
            }

            debug!(
                iteration,
                words_before = word_count(&working),
                words_after = word_count(revised),
                "Refinement iteration finished"
            );
            working = revised.to_string();
            iterations += 1;
        }

        let summary = format!(
            "Applied {} instruction(s) over {} iteration(s); {} words before, {} words after.",
            instructions.len(),
            iterations,
            word_count(document),
            word_count(&working)
        );
        info!(iterations, tokens_used = tokens, "Refinement finished");

        Ok(Outcome::from_reasons(
            RefinementResult {
                refined_text: working,
                summary,
                iterations,
                tokens,
            },
            reasons,
        ))
    }

    fn prompt(&self, document: &str, instructions: &[String], context: &str) -> String {
        let list = if instructions.is_empty() {
            "- Improve clarity and concision without changing the meaning.".to_string()
        } else {
            instructions
                .iter()
                .map(|i| format!("- {}", i.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r##"Revise the document below.

# Instructions

{}

# Constraints

- Keep every "# " section heading, in the same order.
- Do not repeat the same point in more than one section.
- Do not introduce names, numbers, dates or credentials that are not already in the document or the background context.
- Return the complete revised document in markdown and nothing else.

# Background context

{}

# Document

{}"##,
            list,
            or_placeholder(
                truncate_for_prompt(context, self.settings.refinement_context_chars),
                "(none)"
            ),
            document,
        )
    }
}

fn refine_max_tokens(document: &str) -> u32 {
    let estimate = estimate_tokens(document).saturating_mul(3) / 2;
    u32::try_from(estimate).unwrap_or(u32::MAX).clamp(2000, 16_000)
}
