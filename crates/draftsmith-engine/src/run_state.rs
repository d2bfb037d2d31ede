//! Per-invocation run record
//!
//! Created by the caller for one pipeline run and passed by `&mut` through
//! it. There is no process-wide session state; two runs never share one of
//! these.

use chrono::{DateTime, Utc};
use draftsmith_blueprint::UserInputs;
use serde::{Deserialize, Serialize};

use crate::usage::Usage;
use crate::verifier::VerificationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRunState {
    pub run_id: String,
    pub blueprint: String,
    pub user_inputs: UserInputs,
    #[serde(default)]
    pub step_back_summary: Option<String>,
    #[serde(default)]
    pub initial_draft: Option<String>,
    #[serde(default)]
    pub refined_draft: Option<String>,
    #[serde(default)]
    pub verification: Option<VerificationResult>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub model_used: Option<String>,
    /// Every degraded outcome recorded during the run, in order
    #[serde(default)]
    pub degradations: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerationRunState {
    #[must_use]
    pub fn new(blueprint: impl Into<String>, user_inputs: UserInputs) -> Self {
        let blueprint = blueprint.into();
        let now = Utc::now();
        Self {
            run_id: make_run_id(&blueprint, &user_inputs, now),
            blueprint,
            user_inputs,
            step_back_summary: None,
            initial_draft: None,
            refined_draft: None,
            verification: None,
            status: RunStatus::InProgress,
            created_at: now,
            updated_at: now,
            usage: Usage::default(),
            model_used: None,
            degradations: Vec::new(),
            error: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn record_degradations<I, S>(&mut self, reasons: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.degradations.extend(reasons.into_iter().map(Into::into));
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.error = None;
        self.touch();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.touch();
    }

    /// The refined draft when there is one, else the initial draft.
    #[must_use]
    pub fn latest_draft(&self) -> Option<&str> {
        self.refined_draft
            .as_deref()
            .or(self.initial_draft.as_deref())
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// `<UTC timestamp>-<8 hex chars>`; sorts chronologically.
fn make_run_id(blueprint: &str, inputs: &UserInputs, now: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(blueprint.as_bytes());
    for (key, value) in inputs.iter() {
        hasher.update(key.as_bytes());
        hasher.update(b"\0");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(
        now.timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes()
            .as_slice(),
    );
    let digest = hasher.finalize().to_hex();
    format!("{}-{}", now.format("%Y%m%dT%H%M%SZ"), &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_in_progress() {
        let state = GenerationRunState::new("project-charter", UserInputs::new());
        assert_eq!(state.status, RunStatus::InProgress);
        assert_eq!(state.created_at, state.updated_at);
        assert!(state.latest_draft().is_none());

        let (stamp, digest) = state.run_id.split_once('-').unwrap();
        assert_eq!(stamp.len(), 16);
        assert_eq!(digest.len(), 8);
    }

    #[test]
    fn test_lifecycle() {
        let mut state = GenerationRunState::new("memo", UserInputs::new());
        state.initial_draft = Some("first".into());
        assert_eq!(state.latest_draft(), Some("first"));
        state.refined_draft = Some("second".into());
        assert_eq!(state.latest_draft(), Some("second"));

        state.record_degradations(["skeleton fallback"]);
        assert!(state.is_degraded());

        state.fail("backend down");
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("backend down"));
        state.complete();
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }
}
