//! JSON emit functions for CLI output
//!
//! Every `--json` surface goes through [`crate::emit_jcs`] so output is
//! canonical (RFC 8785) and diffs stay stable.

use anyhow::{Context, Result};
use serde::Serialize;

use draftsmith_engine::{ClarifyingQuestion, GenerationRunState, VerificationResult};

use crate::emit_jcs;

/// `generate --json` payload
#[derive(Debug, Serialize)]
pub struct GenerateJsonOutput<'a> {
    pub run_id: &'a str,
    pub blueprint: &'a str,
    pub status: String,
    pub content: &'a str,
    pub model_used: &'a str,
    pub tokens_used: u64,
    pub calls: u32,
    pub sections_generated: &'a [String],
    pub degradations: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<&'a VerificationResult>,
}

impl<'a> GenerateJsonOutput<'a> {
    pub fn new(state: &'a GenerationRunState, content: &'a str, sections: &'a [String]) -> Self {
        Self {
            run_id: &state.run_id,
            blueprint: &state.blueprint,
            status: state.status.to_string(),
            content,
            model_used: state.model_used.as_deref().unwrap_or_default(),
            tokens_used: state.usage.tokens,
            calls: state.usage.calls,
            sections_generated: sections,
            degradations: &state.degradations,
            verification: state.verification.as_ref(),
        }
    }
}

/// `clarify --json` payload
#[derive(Debug, Serialize)]
pub struct ClarifyJsonOutput<'a> {
    pub blueprint: &'a str,
    pub questions: &'a [ClarifyingQuestion],
    pub degraded: bool,
}

pub fn emit_generate_json(output: &GenerateJsonOutput<'_>) -> Result<String> {
    emit_jcs(output).context("Failed to emit generate JSON")
}

pub fn emit_verification_json(result: &VerificationResult) -> Result<String> {
    emit_jcs(result).context("Failed to emit verification JSON")
}

pub fn emit_clarify_json(output: &ClarifyJsonOutput<'_>) -> Result<String> {
    emit_jcs(output).context("Failed to emit clarify JSON")
}
