//! Per-run call and token accounting

use draftsmith_llm::Completion;
use serde::{Deserialize, Serialize};

/// Completion calls and tokens spent by one run.
///
/// Passed by `&mut` through every stage; nothing is counted globally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub calls: u32,
    pub tokens: u64,
    /// Model reported by the most recent successful call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl Usage {
    pub fn record(&mut self, completion: &Completion) {
        self.calls += 1;
        self.tokens += completion.tokens_used;
        if !completion.model_used.is_empty() {
            self.model_used = Some(completion.model_used.clone());
        }
    }

    /// Count a call that failed before producing a completion.
    pub fn record_failed_call(&mut self) {
        self.calls += 1;
    }

    pub fn absorb(&mut self, other: Usage) {
        self.calls += other.calls;
        self.tokens += other.tokens;
        if other.model_used.is_some() {
            self.model_used = other.model_used;
        }
    }
}
