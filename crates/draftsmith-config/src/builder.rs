use std::time::Duration;

use draftsmith_utils::error::ConfigError;
use draftsmith_utils::types::ConfigSource;

use crate::{AnthropicConfig, Config, OpenRouterConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding draftsmith and you need behavior independent of
    /// the user's environment and config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use draftsmith_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .model("claude-sonnet-4-5")
    ///     .max_regenerations(3)
    ///     .call_timeout(Duration::from_secs(60))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.max_regenerations(), 3);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    model: Option<String>,
    call_timeout: Option<Duration>,
    verbose: Option<bool>,
    max_regenerations: Option<u32>,
    context_char_budget: Option<usize>,
    excerpt_chars: Option<usize>,
    default_target_words: Option<u32>,
    refinement_iterations: Option<u32>,
    blueprints_dir: Option<String>,
    runs_dir: Option<String>,
    llm_provider: Option<String>,
    fallback_provider: Option<String>,
    anthropic: Option<AnthropicConfig>,
    openrouter: Option<OpenRouterConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Per-call timeout (5s..=30min).
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Regenerations allowed after a section's first attempt (0..=10).
    #[must_use]
    pub fn max_regenerations(mut self, n: u32) -> Self {
        self.max_regenerations = Some(n);
        self
    }

    #[must_use]
    pub fn context_char_budget(mut self, chars: usize) -> Self {
        self.context_char_budget = Some(chars);
        self
    }

    #[must_use]
    pub fn excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = Some(chars);
        self
    }

    #[must_use]
    pub fn default_target_words(mut self, words: u32) -> Self {
        self.default_target_words = Some(words);
        self
    }

    #[must_use]
    pub fn refinement_iterations(mut self, n: u32) -> Self {
        self.refinement_iterations = Some(n);
        self
    }

    #[must_use]
    pub fn blueprints_dir(mut self, dir: impl Into<String>) -> Self {
        self.blueprints_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn runs_dir(mut self, dir: impl Into<String>) -> Self {
        self.runs_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: impl Into<String>) -> Self {
        self.fallback_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn anthropic(mut self, cfg: AnthropicConfig) -> Self {
        self.anthropic = Some(cfg);
        self
    }

    #[must_use]
    pub fn openrouter(mut self, cfg: OpenRouterConfig) -> Self {
        self.openrouter = Some(cfg);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::defaults_only();
        let src = ConfigSource::Programmatic;

        let set = |key: &str, config: &mut Config| {
            config.source_attribution.insert(key.to_string(), src);
        };

        if let Some(model) = self.model {
            config.defaults.model = Some(model);
            set("model", &mut config);
        }
        if let Some(timeout) = self.call_timeout {
            config.defaults.call_timeout = Some(timeout.as_secs());
            set("call_timeout", &mut config);
        }
        if let Some(verbose) = self.verbose {
            config.defaults.verbose = Some(verbose);
            set("verbose", &mut config);
        }
        if let Some(n) = self.max_regenerations {
            config.generation.max_regenerations = Some(n);
            set("max_regenerations", &mut config);
        }
        if let Some(chars) = self.context_char_budget {
            config.generation.context_char_budget = Some(chars);
            set("context_char_budget", &mut config);
        }
        if let Some(chars) = self.excerpt_chars {
            config.generation.excerpt_chars = Some(chars);
            set("excerpt_chars", &mut config);
        }
        if let Some(words) = self.default_target_words {
            config.generation.default_target_words = Some(words);
            set("default_target_words", &mut config);
        }
        if let Some(n) = self.refinement_iterations {
            config.refinement.max_iterations = Some(n);
            set("refinement_max_iterations", &mut config);
        }
        if let Some(dir) = self.blueprints_dir {
            config.blueprints.dir = Some(dir);
            set("blueprints_dir", &mut config);
        }
        if let Some(dir) = self.runs_dir {
            config.runs.dir = Some(dir);
            set("runs_dir", &mut config);
        }
        if let Some(provider) = self.llm_provider {
            config.llm.provider = Some(provider);
            set("llm_provider", &mut config);
        }
        if let Some(provider) = self.fallback_provider {
            config.llm.fallback_provider = Some(provider);
            set("llm_fallback_provider", &mut config);
        }
        if let Some(cfg) = self.anthropic {
            config.llm.anthropic = Some(cfg);
            set("llm_anthropic_config", &mut config);
        }
        if let Some(cfg) = self.openrouter {
            config.llm.openrouter = Some(cfg);
            set("llm_openrouter_config", &mut config);
        }

        config.validate()?;
        Ok(config)
    }
}
