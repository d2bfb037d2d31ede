use draftsmith_utils::error::ConfigError;

use crate::{Config, SUPPORTED_PROVIDERS};

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn check_range<T>(key: &str, value: Option<T>, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(v) = value
        && (v < min || v > max)
    {
        return Err(invalid(key, format!("{v} is outside {min}..={max}")));
    }
    Ok(())
}

fn check_provider(key: &str, provider: Option<&str>) -> Result<(), ConfigError> {
    if let Some(p) = provider
        && !SUPPORTED_PROVIDERS.contains(&p)
    {
        return Err(invalid(
            key,
            format!(
                "unknown provider '{p}' (expected one of: {})",
                SUPPORTED_PROVIDERS.join(", ")
            ),
        ));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values.
    ///
    /// Called by discovery and the builder; a `Config` handed to the pipeline
    /// has always passed this check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("call_timeout", self.defaults.call_timeout, 5, 1800)?;

        if let Some(model) = &self.defaults.model
            && model.trim().is_empty()
        {
            return Err(invalid("model", "must not be empty"));
        }

        let g = &self.generation;
        check_range("max_regenerations", g.max_regenerations, 0, 10)?;
        check_range("context_char_budget", g.context_char_budget, 500, 50_000)?;
        check_range("excerpt_chars", g.excerpt_chars, 50, 4000)?;
        check_range("default_target_words", g.default_target_words, 1, 5000)?;
        check_range("generation_temperature", g.temperature, 0.0, 2.0)?;

        let v = &self.verification;
        check_range("verification_max_tokens", v.max_tokens, 256, 32_000)?;
        check_range("verification_temperature", v.temperature, 0.0, 2.0)?;
        check_range("verification_context_chars", v.context_char_budget, 0, 50_000)?;

        let r = &self.refinement;
        check_range("refinement_max_iterations", r.max_iterations, 1, 10)?;
        check_range("refinement_temperature", r.temperature, 0.0, 2.0)?;
        check_range("refinement_context_chars", r.context_char_budget, 0, 50_000)?;

        check_provider("llm_provider", self.llm.provider.as_deref())?;
        check_provider("fallback_provider", self.llm.fallback_provider.as_deref())?;

        if let Some(or) = &self.llm.openrouter {
            check_range("openrouter_budget", or.budget, 1, 10_000)?;
        }

        Ok(())
    }
}
