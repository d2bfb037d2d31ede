//! Completion client used by every pipeline stage
//!
//! Wraps an `LlmBackend` behind the narrow `complete(system, user,
//! temperature, max_tokens)` contract the stages are written against.

use draftsmith_config::Config;
use draftsmith_utils::text::estimate_tokens;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::LlmError;
use crate::types::{FinishReason, LlmBackend, LlmFallbackInfo, LlmInvocation, Message};

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Stage label used for logs and test assertions
    pub stage: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.4,
            max_tokens: 2000,
        }
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Text returned by a completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    /// Provider-reported tokens, or a chars/4 estimate when the provider
    /// reports none
    pub tokens_used: u64,
    pub finish_reason: FinishReason,
    pub model_used: String,
}

impl Completion {
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn LlmBackend>,
    /// Empty means the backend's configured model
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            model: String::new(),
            timeout,
        }
    }

    /// Build the configured provider (with fallback) and wrap it.
    ///
    /// # Errors
    ///
    /// Returns the primary provider's construction error when neither the
    /// primary nor the fallback provider can be built.
    pub fn from_config(config: &Config) -> Result<(Self, Option<LlmFallbackInfo>), LlmError> {
        let (backend, fallback) = crate::from_config_with_fallback(config)?;
        Ok((
            Self::new(Arc::from(backend), config.call_timeout()),
            fallback,
        ))
    }

    /// Override the model for every call made through this client.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue one completion call.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `LlmError` unchanged; retries already
    /// happened inside the backend.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.trim().is_empty() {
            messages.push(Message::system(request.system.clone()));
        }
        messages.push(Message::user(request.user.clone()));

        let invocation = LlmInvocation::new(
            request.stage.clone(),
            self.model.clone(),
            self.timeout,
            messages,
        )
        .with_metadata("max_tokens", serde_json::json!(request.max_tokens))
        .with_metadata("temperature", serde_json::json!(request.temperature));

        let result = self.backend.invoke(invocation).await?;

        let tokens_used = match (result.tokens_input, result.tokens_output) {
            (None, None) => (estimate_tokens(&request.system)
                + estimate_tokens(&request.user)
                + estimate_tokens(&result.raw_response)) as u64,
            _ => result.total_tokens(),
        };

        debug!(
            stage = %request.stage,
            tokens_used,
            finish_reason = ?result.finish_reason,
            "Completion received"
        );

        Ok(Completion {
            content: result.raw_response,
            tokens_used,
            finish_reason: result.finish_reason,
            model_used: result.model_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBackend;

    #[tokio::test]
    async fn test_complete_forwards_parameters() {
        let backend = Arc::new(ScriptedBackend::with_replies(["drafted"]));
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(30))
            .with_model("claude-haiku-4-5");

        let completion = client
            .complete(
                CompletionRequest::new("section", "be brief", "write intro")
                    .temperature(0.2)
                    .max_tokens(300),
            )
            .await
            .unwrap();

        assert_eq!(completion.content, "drafted");
        assert_eq!(completion.model_used, "claude-haiku-4-5");
        assert!(completion.tokens_used > 0);
        assert!(!completion.is_truncated());

        let call = &backend.calls()[0];
        assert_eq!(call.stage, "section");
        assert_eq!(call.system.as_deref(), Some("be brief"));
        assert_eq!(call.user, "write intro");
        assert_eq!(call.max_tokens, Some(300));
        assert_eq!(call.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_empty_system_prompt_is_omitted() {
        let backend = Arc::new(ScriptedBackend::with_replies(["ok"]));
        let client = CompletionClient::new(backend.clone(), Duration::from_secs(30));
        client
            .complete(CompletionRequest::new("distill", "  ", "summary"))
            .await
            .unwrap();
        assert_eq!(backend.calls()[0].system, None);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::ProviderAuth("bad key".into()));
        let client = CompletionClient::new(backend, Duration::from_secs(30));
        let err = client
            .complete(CompletionRequest::new("verify", "", "doc"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
