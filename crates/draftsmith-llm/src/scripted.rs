//! Scripted backend for tests
//!
//! Replays queued replies in order, then falls back to an optional responder
//! closure. Every invocation is recorded so tests can assert on prompts, call
//! counts and request parameters without touching the network.

use async_trait::async_trait;
use draftsmith_utils::text::estimate_tokens;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::LlmError;
use crate::types::{FinishReason, LlmBackend, LlmInvocation, LlmResult};

type Responder = Box<dyn Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync>;

/// One queued reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Truncated(String),
    Error(LlmError),
}

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: String,
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

pub struct ScriptedBackend {
    queue: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    model: String,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
            model: "scripted-model".to_string(),
        }
    }

    /// Backend that replies with each string in order.
    #[must_use]
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for reply in replies {
            backend.push(ScriptedReply::Text(reply.into()));
        }
        backend
    }

    /// Backend that computes every reply from the invocation.
    #[must_use]
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Text(text.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.push(ScriptedReply::Error(error));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Recorded calls for one stage, in order.
    #[must_use]
    pub fn calls_for_stage(&self, stage: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == stage)
            .collect()
    }

    fn next_reply(&self, inv: &LlmInvocation) -> ScriptedReply {
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(reply) = queued {
            return reply;
        }
        match &self.responder {
            Some(responder) => match responder(inv) {
                Ok(text) => ScriptedReply::Text(text),
                Err(e) => ScriptedReply::Error(e),
            },
            None => ScriptedReply::Error(LlmError::Transport(
                "scripted backend has no reply left".to_string(),
            )),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedCall {
                stage: inv.stage.clone(),
                model: inv.model.clone(),
                system: inv.system_prompt(),
                user: inv.user_prompt().to_string(),
                max_tokens: inv.max_tokens(),
                temperature: inv.temperature(),
            });

        let (text, finish_reason) = match self.next_reply(&inv) {
            ScriptedReply::Text(text) => (text, FinishReason::Stop),
            ScriptedReply::Truncated(text) => (text, FinishReason::Length),
            ScriptedReply::Error(e) => return Err(e),
        };

        let tokens_in: u64 = inv
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content) as u64)
            .sum();
        let tokens_out = estimate_tokens(&text) as u64;
        let model = if inv.model.is_empty() {
            self.model.clone()
        } else {
            inv.model.clone()
        };

        Ok(LlmResult::new(text, "scripted", model)
            .with_tokens(tokens_in, tokens_out)
            .with_finish_reason(finish_reason))
    }
}
