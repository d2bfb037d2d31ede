//! Budgeted backend wrapper for LLM call limiting
//!
//! Wraps any `LlmBackend` and caps the number of invocations per process.
//! Both HTTP providers are wrapped so a runaway regeneration loop cannot
//! issue unbounded paid calls.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Default budget limit for provider calls per process
pub(crate) const DEFAULT_BUDGET_LIMIT: u32 = 60;

/// Environment variable for overriding the budget limit
pub const BUDGET_ENV_VAR: &str = "DRAFTSMITH_LLM_BUDGET";

/// A wrapper around an `LlmBackend` that enforces a budget limit on invocations.
///
/// The budget tracks attempted calls, not successful requests: a failed call
/// still consumes its slot.
pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    budget: Arc<AtomicU32>,
    limit: u32,
}

impl BudgetedBackend {
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            budget: Arc::new(AtomicU32::new(0)),
            limit,
        }
    }

    /// Create a budgeted backend with the limit resolved from configuration
    ///
    /// Precedence (highest to lowest):
    /// 1. `DRAFTSMITH_LLM_BUDGET`
    /// 2. `[llm.openrouter] budget`
    /// 3. Default (60 calls per process)
    pub fn with_limit_from_config(inner: Box<dyn LlmBackend>, config_budget: Option<u32>) -> Self {
        let env_limit = std::env::var(BUDGET_ENV_VAR)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());

        let limit = match (env_limit, config_budget) {
            (Some(limit), _) => {
                debug!(limit, "Using budget limit from {}", BUDGET_ENV_VAR);
                limit
            }
            (None, Some(limit)) => {
                debug!(limit, "Using budget limit from config file");
                limit
            }
            (None, None) => DEFAULT_BUDGET_LIMIT,
        };

        Self::new(inner, limit)
    }

    /// Calls attempted so far, including rejected ones.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.budget.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        // Count before calling so failures cannot bypass the limit.
        let current = self.budget.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted, "Budget limit exceeded");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        let result = self.inner.invoke(inv).await;

        if let Err(e) = &result {
            debug!(
                call_count = current + 1,
                limit = self.limit,
                error = %e,
                "Inner backend invocation failed (budget slot still consumed)"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use serial_test::serial;
    use std::time::Duration;

    struct MockSuccessBackend;

    #[async_trait]
    impl LlmBackend for MockSuccessBackend {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Ok(LlmResult::new("ok", "mock", "mock-model"))
        }
    }

    struct MockFailureBackend;

    #[async_trait]
    impl LlmBackend for MockFailureBackend {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Err(LlmError::Transport("mock failure".to_string()))
        }
    }

    fn invocation() -> LlmInvocation {
        LlmInvocation::new(
            "section",
            "mock-model",
            Duration::from_secs(60),
            vec![Message::user("write")],
        )
    }

    #[tokio::test]
    async fn test_budget_allows_calls_under_limit() {
        let backend = BudgetedBackend::new(Box::new(MockSuccessBackend), 2);
        assert!(backend.invoke(invocation()).await.is_ok());
        assert!(backend.invoke(invocation()).await.is_ok());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_budget_rejects_call_over_limit() {
        let backend = BudgetedBackend::new(Box::new(MockSuccessBackend), 1);
        backend.invoke(invocation()).await.unwrap();

        match backend.invoke(invocation()).await {
            Err(LlmError::BudgetExceeded { limit, attempted }) => {
                assert_eq!(limit, 1);
                assert_eq!(attempted, 2);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_calls_consume_budget() {
        let backend = BudgetedBackend::new(Box::new(MockFailureBackend), 1);
        assert!(matches!(
            backend.invoke(invocation()).await,
            Err(LlmError::Transport(_))
        ));
        assert!(matches!(
            backend.invoke(invocation()).await,
            Err(LlmError::BudgetExceeded { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_limit_precedence() {
        unsafe { std::env::remove_var(BUDGET_ENV_VAR) };
        let backend = BudgetedBackend::with_limit_from_config(Box::new(MockSuccessBackend), None);
        assert_eq!(backend.limit(), DEFAULT_BUDGET_LIMIT);

        let backend =
            BudgetedBackend::with_limit_from_config(Box::new(MockSuccessBackend), Some(7));
        assert_eq!(backend.limit(), 7);

        unsafe { std::env::set_var(BUDGET_ENV_VAR, "3") };
        let backend =
            BudgetedBackend::with_limit_from_config(Box::new(MockSuccessBackend), Some(7));
        unsafe { std::env::remove_var(BUDGET_ENV_VAR) };
        assert_eq!(backend.limit(), 3);
    }
}
