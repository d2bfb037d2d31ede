//! Section generation controller
//!
//! Drafts every section in blueprint order. Each section gets at most
//! `max_regenerations + 1` attempts under a word ceiling and the
//! invented-name check. A section whose attempts all fail verification is
//! still accepted, flagged `is_valid = false`. After each acceptance a short
//! excerpt is appended to the running context summary that every later
//! section prompt carries, so later sections can avoid repeating earlier ones.
//!
//! The summary is owned by one `generate_all` call. Sections are drafted
//! strictly one after another because each prompt depends on the summary
//! produced by the sections before it.

use draftsmith_blueprint::{Blueprint, Section, UserInputs};
use draftsmith_llm::{CompletionClient, CompletionRequest, LlmError};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::{log_degraded, stage_span};
use draftsmith_utils::redaction::redact_error_message;
use draftsmith_utils::text::{truncate_chars, word_count};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{Instrument, debug, info, warn};

use crate::context::truncate_for_prompt;
use crate::hallucination::find_ungrounded_names;
use crate::outcome::Outcome;
use crate::prompts::{anti_hallucination_block, or_placeholder, system_prompt};
use crate::settings::PipelineSettings;
use crate::skeleton::{Skeleton, SkeletonEntry};
use crate::usage::Usage;

const STAGE: &str = "section";

/// Smallest `max_tokens` sent for a section.
pub const MIN_SECTION_MAX_TOKENS: u32 = 256;

/// Word ceiling for an attempt, in tenths of the target: 120% on the first
/// attempt, 110% once a draft has been rejected.
#[must_use]
pub fn word_ceiling(target_words: u32, tight: bool) -> u32 {
    let tenths: u64 = if tight { 11 } else { 12 };
    u32::try_from(u64::from(target_words) * tenths / 10).unwrap_or(u32::MAX)
}

/// One accepted section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionContent {
    pub section_id: String,
    pub title: String,
    /// Markdown body without a heading
    pub content: String,
    pub word_count: usize,
    pub target_words: u32,
    pub is_valid: bool,
    /// Index of the accepted attempt; equals `max_regenerations` when every
    /// attempt failed verification
    pub regeneration_count: u32,
}

/// Why an attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooLong { words: usize, limit: u32 },
    SuspectNames(Vec<String>),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLong { words, limit } => write!(f, "{words} words exceeds limit of {limit}"),
            Self::SuspectNames(names) => {
                write!(f, "names not found in the grounding text: {}", names.join(", "))
            }
        }
    }
}

/// Check a candidate against the word limit and the invented-name filter.
///
/// `grounding` is every text a name may legitimately come from: the user
/// input values plus the clarification summary, when there is one.
#[must_use]
pub fn check_candidate(content: &str, target_words: u32, grounding: &str) -> Vec<Rejection> {
    let mut rejections = Vec::new();
    let words = word_count(content);
    let limit = word_ceiling(target_words, false);
    if words > limit as usize {
        rejections.push(Rejection::TooLong { words, limit });
    }
    let suspects = find_ungrounded_names(content, grounding);
    if !suspects.is_empty() {
        rejections.push(Rejection::SuspectNames(suspects));
    }
    rejections
}

/// Result of one `generate_all` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedSections {
    sections: Vec<SectionContent>,
    context_summary: String,
}

impl GeneratedSections {
    /// Sections in generation order.
    #[must_use]
    pub fn sections(&self) -> &[SectionContent] {
        &self.sections
    }

    #[must_use]
    pub fn get(&self, section_id: &str) -> Option<&SectionContent> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.title.clone()).collect()
    }

    /// The running summary after the last section was accepted.
    #[must_use]
    pub fn context_summary(&self) -> &str {
        &self.context_summary
    }

    #[must_use]
    pub fn invalid_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| !s.is_valid)
            .map(|s| s.section_id.as_str())
            .collect()
    }

    /// Sections keyed by id, for the assembler.
    #[must_use]
    pub fn by_id(&self) -> BTreeMap<String, SectionContent> {
        self.sections
            .iter()
            .map(|s| (s.section_id.clone(), s.clone()))
            .collect()
    }
}

pub struct SectionController<'a> {
    client: &'a CompletionClient,
    settings: &'a PipelineSettings,
    strategic_summary: Option<&'a str>,
}

impl<'a> SectionController<'a> {
    #[must_use]
    pub fn new(client: &'a CompletionClient, settings: &'a PipelineSettings) -> Self {
        Self {
            client,
            settings,
            strategic_summary: None,
        }
    }

    /// Embed a clarification summary in every section prompt.
    #[must_use]
    pub fn with_strategic_summary(mut self, summary: Option<&'a str>) -> Self {
        self.strategic_summary = summary.filter(|s| !s.trim().is_empty());
        self
    }

    /// Draft every section of `blueprint` in ascending `order`.
    ///
    /// The outcome is degraded when any section was accepted without passing
    /// verification.
    ///
    /// # Errors
    ///
    /// Fatal backend errors propagate as `DraftError::Llm`. A section whose
    /// attempts all failed before producing any text yields
    /// `DraftError::GenerationFailed`.
    pub async fn generate_all(
        &self,
        blueprint: &Blueprint,
        skeleton: &Skeleton,
        inputs: &UserInputs,
        context: &str,
        max_regenerations: u32,
        usage: &mut Usage,
    ) -> Result<Outcome<GeneratedSections>, DraftError> {
        let mut generated = GeneratedSections::default();
        let mut reasons = Vec::new();

        for section in blueprint.sections_in_order() {
            let fallback_entry;
            let entry = match skeleton.get(&section.id) {
                Some(entry) => entry,
                None => {
                    fallback_entry = SkeletonEntry::fallback_for(section);
                    &fallback_entry
                }
            };
            let target_words =
                blueprint.target_words(&section.id, self.settings.default_target_words);

            let accepted = self
                .generate_section(
                    blueprint,
                    section,
                    entry,
                    target_words,
                    inputs,
                    context,
                    &generated.context_summary,
                    max_regenerations,
                    usage,
                )
                .instrument(stage_span(STAGE, Some(&section.id)))
                .await?;

            if !accepted.is_valid {
                let reason = format!(
                    "section '{}' accepted without passing verification after {} attempt(s)",
                    accepted.section_id,
                    max_regenerations + 1
                );
                log_degraded(STAGE, &reason);
                reasons.push(reason);
            }

            let excerpt = truncate_chars(&accepted.content, self.settings.excerpt_chars);
            generated
                .context_summary
                .push_str(&format!("[{}] {}\n\n", accepted.title, excerpt.trim()));
            generated.sections.push(accepted);
        }

        info!(
            sections = generated.len(),
            invalid = generated.invalid_ids().len(),
            calls = usage.calls,
            tokens_used = usage.tokens,
            "Sections generated"
        );
        Ok(Outcome::from_reasons(generated, reasons))
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_section(
        &self,
        blueprint: &Blueprint,
        section: &Section,
        entry: &SkeletonEntry,
        target_words: u32,
        inputs: &UserInputs,
        context: &str,
        summary: &str,
        max_regenerations: u32,
        usage: &mut Usage,
    ) -> Result<SectionContent, DraftError> {
        let system = system_prompt(blueprint);
        let grounding = self.name_grounding(inputs);
        let mut last_candidate: Option<String> = None;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=max_regenerations {
            let tight = attempt > 0;
            let limit = word_ceiling(target_words, tight);
            let request = CompletionRequest::new(
                STAGE,
                system.clone(),
                self.prompt(blueprint, section, entry, target_words, limit, tight, inputs, context, summary),
            )
            .temperature(self.settings.generation_temperature)
            .max_tokens(limit.saturating_mul(2).max(MIN_SECTION_MAX_TOKENS));

            let completion = match self.client.complete(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    usage.record_failed_call();
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    warn!(
                        attempt,
                        error = %redact_error_message(&e.to_string()),
                        "Section attempt failed"
                    );
                    last_error = Some(e);
                    continue;
                }
            };
            usage.record(&completion);

            let content = completion.content.trim().to_string();
            let words = word_count(&content);
            let rejections = check_candidate(&content, target_words, &grounding);
            debug!(
                attempt,
                word_count = words,
                target_words,
                tokens_used = completion.tokens_used,
                truncated = completion.is_truncated(),
                valid = rejections.is_empty(),
                "Section attempt finished"
            );

            if rejections.is_empty() {
                return Ok(SectionContent {
                    section_id: section.id.clone(),
                    title: section.title.clone(),
                    content,
                    word_count: words,
                    target_words,
                    is_valid: true,
                    regeneration_count: attempt,
                });
            }

            for rejection in &rejections {
                debug!(attempt, reason = %rejection, "Section attempt rejected");
            }
            last_candidate = Some(content);
        }

        match last_candidate {
            Some(content) => Ok(SectionContent {
                section_id: section.id.clone(),
                title: section.title.clone(),
                word_count: word_count(&content),
                content,
                target_words,
                is_valid: false,
                regeneration_count: max_regenerations,
            }),
            None => Err(DraftError::GenerationFailed {
                section_id: section.id.clone(),
                attempts: max_regenerations + 1,
                last_error: last_error
                    .unwrap_or_else(|| LlmError::Transport("no attempt was made".to_string())),
            }),
        }
    }

    fn name_grounding(&self, inputs: &UserInputs) -> String {
        let mut grounding = inputs.concatenated();
        if let Some(summary) = self.strategic_summary {
            grounding.push('\n');
            grounding.push_str(summary);
        }
        grounding
    }

    #[allow(clippy::too_many_arguments)]
    fn prompt(
        &self,
        blueprint: &Blueprint,
        section: &Section,
        entry: &SkeletonEntry,
        target_words: u32,
        limit: u32,
        tight: bool,
        inputs: &UserInputs,
        context: &str,
        summary: &str,
    ) -> String {
        let mut plan = format!("Purpose: {}", entry.purpose.trim());
        if !entry.key_points.is_empty() {
            plan.push_str("\nKey points:");
            for point in &entry.key_points {
                plan.push_str(&format!("\n- {point}"));
            }
        }
        if !entry.data_to_include.is_empty() {
            plan.push_str("\nData to include:");
            for item in &entry.data_to_include {
                plan.push_str(&format!("\n- {item}"));
            }
        }
        for sub in &section.subsections {
            plan.push_str(&format!("\nCover \"{}\": {}", sub.title, sub.description));
        }

        let strategic = match self.strategic_summary {
            Some(text) => format!("\n# Strategic summary\n\n{}\n", text.trim()),
            None => String::new(),
        };

        let length = if tight {
            format!(
                "Your previous draft was rejected. This is a hard limit: write at most {limit} words. \
                 Aim for about {target_words} words and cut anything that is not essential."
            )
        } else {
            format!("Write about {target_words} words and never more than {limit} words.")
        };

        format!(
            r#"Write the "{}" section of the {}.

# Section plan

{}

# Sections already written (do not repeat their content)

{}
{}
# Facts provided by the user (the only facts you may state)

{}

# Background context

{}

# Length

{}

{}

Return only the section body in markdown. Do not include the section title as a heading."#,
            section.title,
            blueprint.name,
            plan,
            or_placeholder(summary, "(none yet, this is the first section)"),
            strategic,
            or_placeholder(&inputs.grounding_text(), "(none)"),
            or_placeholder(
                truncate_for_prompt(context, self.settings.context_char_budget),
                "(none)"
            ),
            length,
            anti_hallucination_block(&blueprint.prompt_config),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_llm::ScriptedBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn blueprint() -> Blueprint {
        serde_json::from_value(serde_json::json!({
            "name": "memo",
            "sections": [
                {"id": "conclusion", "title": "Conclusion", "description": "Close", "order": 3},
                {"id": "intro", "title": "Introduction", "description": "Open", "order": 1},
                {"id": "body", "title": "Body", "description": "Argue", "order": 2}
            ],
            "prompt_config": {
                "section_word_targets": {"intro": 50, "body": 100, "conclusion": 50}
            }
        }))
        .unwrap()
    }

    fn client(backend: &Arc<ScriptedBackend>) -> CompletionClient {
        CompletionClient::new(backend.clone(), Duration::from_secs(5))
    }

    #[test]
    fn test_word_ceiling() {
        assert_eq!(word_ceiling(100, false), 120);
        assert_eq!(word_ceiling(100, true), 110);
        assert_eq!(word_ceiling(50, false), 60);
        assert_eq!(word_ceiling(55, true), 60);
    }

    #[test]
    fn test_check_candidate() {
        assert!(check_candidate(&words(60), 50, "").is_empty());
        assert_eq!(
            check_candidate(&words(61), 50, ""),
            vec![Rejection::TooLong { words: 61, limit: 60 }]
        );
        assert!(matches!(
            check_candidate("Dr. Jane Doe agrees.", 50, "")[0],
            Rejection::SuspectNames(_)
        ));
        assert!(check_candidate("Dr. Jane Doe agrees.", 50, "sponsor: Dr. Jane Doe").is_empty());
    }

    #[tokio::test]
    async fn test_first_attempt_valid() {
        let backend = Arc::new(ScriptedBackend::with_replies([words(40), words(90), words(45)]));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();
        let mut usage = Usage::default();

        let outcome = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut usage)
            .await
            .unwrap();

        assert!(!outcome.is_degraded());
        let generated = outcome.value();
        assert_eq!(generated.titles(), vec!["Introduction", "Body", "Conclusion"]);
        assert!(generated.sections().iter().all(|s| s.is_valid && s.regeneration_count == 0));
        assert_eq!(generated.get("body").unwrap().target_words, 100);
        assert_eq!(usage.calls, 3);
    }

    #[tokio::test]
    async fn test_retry_tightens_limit_and_records_attempt_index() {
        let backend = Arc::new(ScriptedBackend::with_replies([
            words(40),
            words(150),
            words(100),
            words(45),
        ]));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let outcome = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut Usage::default())
            .await
            .unwrap();
        let body = outcome.value().get("body").unwrap();
        assert!(body.is_valid);
        assert_eq!(body.regeneration_count, 1);

        let calls = backend.calls();
        assert!(calls[1].user.contains("never more than 120 words"));
        assert!(calls[2].user.contains("at most 110 words"));
        assert_eq!(calls[2].max_tokens, Some(256));
    }

    #[tokio::test]
    async fn test_exhaustion_accepts_last_candidate() {
        let backend = Arc::new(ScriptedBackend::with_responder(|_| Ok(words(200))));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();
        let mut usage = Usage::default();

        let outcome = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut usage)
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        let body = outcome.value().get("body").unwrap();
        assert!(!body.is_valid);
        assert_eq!(body.regeneration_count, 2);
        assert_eq!(body.word_count, 200);
        assert_eq!(backend.call_count(), 9);
        assert_eq!(usage.calls, 9);
    }

    #[tokio::test]
    async fn test_transient_error_consumes_a_slot() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::Timeout {
            duration: Duration::from_secs(1),
        });
        backend.push_text(words(10));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp: Blueprint = serde_json::from_value(serde_json::json!({
            "name": "one",
            "sections": [{"id": "only", "title": "Only", "order": 1}]
        }))
        .unwrap();

        let outcome = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut Usage::default())
            .await
            .unwrap();
        assert_eq!(outcome.value().get("only").unwrap().regeneration_count, 1);
    }

    #[tokio::test]
    async fn test_all_attempts_erroring_fails_generation() {
        let backend = Arc::new(ScriptedBackend::with_responder(|_| {
            Err(LlmError::ProviderOutage("503".into()))
        }));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let result = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 1, &mut Usage::default())
            .await;
        match result {
            Err(DraftError::GenerationFailed {
                section_id,
                attempts,
                ..
            }) => {
                assert_eq!(section_id, "intro");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderQuota("429".into()));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let result = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut Usage::default())
            .await;
        assert!(matches!(result, Err(DraftError::Llm(LlmError::ProviderQuota(_)))));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_context_summary_accumulates_in_order() {
        let backend = Arc::new(ScriptedBackend::with_replies([
            "Alpha opening text.",
            "Beta middle text.",
            "Gamma closing text.",
        ]));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let outcome = SectionController::new(&client, &settings)
            .with_strategic_summary(Some("Win the Q3 budget."))
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 0, &mut Usage::default())
            .await
            .unwrap();

        let calls = backend.calls();
        assert!(calls[0].user.contains("this is the first section"));
        let third = &calls[2].user;
        let alpha = third.find("Alpha opening text.").unwrap();
        let beta = third.find("Beta middle text.").unwrap();
        assert!(alpha < beta);
        assert!(!third.contains("Gamma closing text."));
        assert!(third.contains("Win the Q3 budget."));

        assert_eq!(
            outcome.value().context_summary(),
            "[Introduction] Alpha opening text.\n\n[Body] Beta middle text.\n\n[Conclusion] Gamma closing text.\n\n"
        );
    }

    #[tokio::test]
    async fn test_names_from_clarification_summary_are_grounded() {
        let backend = Arc::new(ScriptedBackend::with_replies([
            "Dr. Priya Nair sponsors the work.",
            "Scope is fixed.",
            "Dr. Priya Nair signs off.",
        ]));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let outcome = SectionController::new(&client, &settings)
            .with_strategic_summary(Some("Sponsor: Dr. Priya Nair, head of operations."))
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut Usage::default())
            .await
            .unwrap();

        assert!(!outcome.is_degraded());
        assert!(outcome.value().sections().iter().all(|s| s.is_valid && s.regeneration_count == 0));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_titled_name_is_regenerated() {
        let backend = Arc::new(ScriptedBackend::with_replies([
            "Dr. Omar Haddad sponsors the work.",
            "The operations team sponsors the work.",
            "Scope is fixed.",
            "Done.",
        ]));
        let client = client(&backend);
        let settings = PipelineSettings::default();
        let bp = blueprint();

        let outcome = SectionController::new(&client, &settings)
            .with_strategic_summary(Some("Sponsor: Dr. Priya Nair."))
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 2, &mut Usage::default())
            .await
            .unwrap();

        let intro = outcome.value().get("intro").unwrap();
        assert!(intro.is_valid);
        assert_eq!(intro.regeneration_count, 1);
        assert_eq!(intro.content, "The operations team sponsors the work.");
    }

    #[tokio::test]
    async fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        let backend = Arc::new(ScriptedBackend::with_replies([long.as_str(), "b", "c"]));
        let client = client(&backend);
        let settings = PipelineSettings {
            excerpt_chars: 400,
            ..PipelineSettings::default()
        };
        let bp = blueprint();

        let outcome = SectionController::new(&client, &settings)
            .generate_all(&bp, &Skeleton::all_fallback(&bp), &UserInputs::new(), "", 0, &mut Usage::default())
            .await
            .unwrap();
        let summary = outcome.value().context_summary();
        assert!(summary.starts_with(&format!("[Introduction] {}\n\n", "x".repeat(400))));
    }
}
