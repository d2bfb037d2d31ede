//! LLM backend abstraction for multi-provider support
//!
//! Every provider implements the `LlmBackend` trait. Pipeline stages talk to
//! a `CompletionClient`, which wraps whichever backend the configuration
//! selected.

mod anthropic_backend;
mod budgeted_backend;
mod client;
pub(crate) mod http_client;
mod openrouter_backend;
#[cfg(any(test, feature = "test-utils"))]
mod scripted;
mod types;

pub use budgeted_backend::{BUDGET_ENV_VAR, BudgetedBackend};
pub use client::{Completion, CompletionClient, CompletionRequest};
pub use draftsmith_utils::error::LlmError;
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{RecordedCall, ScriptedBackend, ScriptedReply};
pub use types::{
    FinishReason, LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role,
};

pub(crate) use anthropic_backend::AnthropicBackend;
pub(crate) use openrouter_backend::OpenRouterBackend;

use draftsmith_config::{Config, SUPPORTED_PROVIDERS};
use draftsmith_utils::redaction::redact_error_message;
use tracing::{error, info, warn};

/// Construct a backend for one provider, wrapped in the call budget.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for an unknown provider and
/// `LlmError::Misconfiguration` when provider settings are unusable.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    let config_budget = config.llm.openrouter.as_ref().and_then(|or| or.budget);

    let backend: Box<dyn LlmBackend> = match provider {
        "anthropic" => Box::new(AnthropicBackend::new_from_config(config)?),
        "openrouter" => Box::new(OpenRouterBackend::new_from_config(config)?),
        unknown => {
            return Err(LlmError::Unsupported(format!(
                "Unknown LLM provider '{}'. Supported providers: {}.",
                unknown,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }
    };

    Ok(Box::new(BudgetedBackend::with_limit_from_config(
        backend,
        config_budget,
    )))
}

/// Create an LLM backend from configuration, returning fallback metadata when used.
///
/// The fallback provider is only tried when the primary provider fails to
/// construct (missing key, bad settings). Runtime failures never switch
/// providers.
///
/// # Errors
///
/// Returns the primary provider's error when both providers fail to build.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Box<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.llm_provider();

    let primary_error = match construct_backend_for_provider(provider, config) {
        Ok(backend) => return Ok((backend, None)),
        Err(e) => e,
    };

    let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
        return Err(primary_error);
    };

    let reason = redact_error_message(&primary_error.to_string());
    warn!(
        primary = provider,
        fallback = fallback_provider,
        reason = %reason,
        "Primary provider failed during construction, attempting fallback"
    );

    match construct_backend_for_provider(fallback_provider, config) {
        Ok(backend) => {
            info!(provider = fallback_provider, "Using fallback provider");
            Ok((
                backend,
                Some(LlmFallbackInfo {
                    primary_provider: provider.to_string(),
                    fallback_provider: fallback_provider.to_string(),
                    reason,
                }),
            ))
        }
        Err(fallback_error) => {
            error!(
                provider = fallback_provider,
                error = %redact_error_message(&fallback_error.to_string()),
                "Fallback provider also failed"
            );
            Err(primary_error)
        }
    }
}

/// Create an LLM backend from configuration, discarding fallback metadata.
///
/// # Errors
///
/// See [`from_config_with_fallback`].
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    from_config_with_fallback(config).map(|(backend, _)| backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_config::{AnthropicConfig, OpenRouterConfig};
    use serial_test::serial;

    const PRIMARY_KEY: &str = "DRAFTSMITH_TEST_PRIMARY_KEY";
    const FALLBACK_KEY: &str = "DRAFTSMITH_TEST_FALLBACK_KEY";

    fn config_with_fallback() -> Config {
        Config::builder()
            .llm_provider("anthropic")
            .fallback_provider("openrouter")
            .anthropic(AnthropicConfig {
                api_key_env: Some(PRIMARY_KEY.to_string()),
                ..AnthropicConfig::default()
            })
            .openrouter(OpenRouterConfig {
                api_key_env: Some(FALLBACK_KEY.to_string()),
                model: Some("anthropic/claude-sonnet-4.5".to_string()),
                ..OpenRouterConfig::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    #[serial]
    fn test_primary_provider_used_when_available() {
        unsafe {
            std::env::set_var(PRIMARY_KEY, "primary");
            std::env::set_var(FALLBACK_KEY, "fallback");
        }
        let result = from_config_with_fallback(&config_with_fallback());
        unsafe {
            std::env::remove_var(PRIMARY_KEY);
            std::env::remove_var(FALLBACK_KEY);
        }
        let (_, fallback) = result.unwrap();
        assert!(fallback.is_none());
    }

    #[test]
    #[serial]
    fn test_fallback_used_when_primary_misconfigured() {
        unsafe {
            std::env::remove_var(PRIMARY_KEY);
            std::env::set_var(FALLBACK_KEY, "fallback");
        }
        let result = from_config_with_fallback(&config_with_fallback());
        unsafe { std::env::remove_var(FALLBACK_KEY) };

        let (_, fallback) = result.unwrap();
        let info = fallback.expect("fallback info");
        assert_eq!(info.primary_provider, "anthropic");
        assert_eq!(info.fallback_provider, "openrouter");
        assert!(info.reason.contains(PRIMARY_KEY));
    }

    #[test]
    #[serial]
    fn test_primary_error_returned_when_both_fail() {
        unsafe {
            std::env::remove_var(PRIMARY_KEY);
            std::env::remove_var(FALLBACK_KEY);
        }
        match from_config(&config_with_fallback()) {
            Err(LlmError::Misconfiguration(msg)) => assert!(msg.contains("Anthropic")),
            _ => panic!("expected primary misconfiguration"),
        }
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let config = Config::defaults_only();
        assert!(matches!(
            construct_backend_for_provider("gemini", &config),
            Err(LlmError::Unsupported(_))
        ));
    }
}
