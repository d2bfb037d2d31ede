use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use draftsmith_utils::types::ConfigSource;

/// Default model passed to the backend when nothing else is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
/// Default per-call timeout in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
/// Default number of regenerations after the first section attempt
pub const DEFAULT_MAX_REGENERATIONS: u32 = 2;
/// Default characters of aggregated context embedded per drafting prompt
pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 3000;
/// Default characters of aggregated context embedded in the verifier prompt
pub const DEFAULT_VERIFIER_CONTEXT_CHARS: usize = 2000;
/// Default characters of aggregated context embedded in refinement prompts
pub const DEFAULT_REFINEMENT_CONTEXT_CHARS: usize = 1000;
/// Default length of each excerpt kept in the running context summary
pub const DEFAULT_EXCERPT_CHARS: usize = 400;
/// Word target for sections without an explicit target
pub const DEFAULT_TARGET_WORDS: u32 = 200;
pub const DEFAULT_GENERATION_TEMPERATURE: f32 = 0.4;
pub const DEFAULT_VERIFICATION_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_VERIFICATION_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_REFINEMENT_ITERATIONS: u32 = 1;
pub const DEFAULT_REFINEMENT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_BLUEPRINTS_DIR: &str = ".draftsmith/blueprints";
pub const DEFAULT_RUNS_DIR: &str = ".draftsmith/runs";
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Providers the completion client knows how to build
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "openrouter"];

/// Configuration for draftsmith operations.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Honors an explicit `--config` path
/// - Searches for `.draftsmith/config.toml` upward from current directory
/// - Falls back to `$DRAFTSMITH_HOME/config.toml`
/// - Applies built-in defaults for unspecified values
///
/// # Source Attribution
///
/// Each configuration value tracks its source (`cli`, `env`, `config`,
/// `programmatic`, or `default`) for `draftsmith config`-style display.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// model = "claude-sonnet-4-5"
/// call_timeout = 120
///
/// [generation]
/// max_regenerations = 2
/// context_char_budget = 3000
///
/// [llm]
/// provider = "anthropic"
/// fallback_provider = "openrouter"
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Model, timeout and verbosity.
    pub defaults: Defaults,
    /// Section drafting knobs.
    pub generation: GenerationConfig,
    /// Rubric scoring knobs.
    pub verification: VerificationConfig,
    /// Refinement and self-critique knobs.
    pub refinement: RefinementConfig,
    /// Where on-disk blueprints live.
    pub blueprints: BlueprintsConfig,
    /// Where run records are written.
    pub runs: RunsConfig,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Path of the config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting.
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[defaults]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    pub model: Option<String>,
    /// Seconds per completion call
    pub call_timeout: Option<u64>,
    pub verbose: Option<bool>,
}

/// `[generation]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub max_regenerations: Option<u32>,
    pub context_char_budget: Option<usize>,
    pub excerpt_chars: Option<usize>,
    pub default_target_words: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[verification]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub context_char_budget: Option<usize>,
}

/// `[refinement]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefinementConfig {
    pub max_iterations: Option<u32>,
    pub temperature: Option<f32>,
    pub context_char_budget: Option<usize>,
}

/// `[blueprints]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BlueprintsConfig {
    pub dir: Option<String>,
}

/// `[runs]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunsConfig {
    pub dir: Option<String>,
}

/// `[llm]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub anthropic: Option<AnthropicConfig>,
    pub openrouter: Option<OpenRouterConfig>,
}

/// `[llm.anthropic]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[llm.openrouter]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Maximum completion calls per process
    pub budget: Option<u32>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: Some(DEFAULT_MODEL.to_string()),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT_SECS),
            verbose: Some(false),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_regenerations: Some(DEFAULT_MAX_REGENERATIONS),
            context_char_budget: Some(DEFAULT_CONTEXT_CHAR_BUDGET),
            excerpt_chars: Some(DEFAULT_EXCERPT_CHARS),
            default_target_words: Some(DEFAULT_TARGET_WORDS),
            temperature: Some(DEFAULT_GENERATION_TEMPERATURE),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_tokens: Some(DEFAULT_VERIFICATION_MAX_TOKENS),
            temperature: Some(DEFAULT_VERIFICATION_TEMPERATURE),
            context_char_budget: Some(DEFAULT_VERIFIER_CONTEXT_CHARS),
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(DEFAULT_REFINEMENT_ITERATIONS),
            temperature: Some(DEFAULT_REFINEMENT_TEMPERATURE),
            context_char_budget: Some(DEFAULT_REFINEMENT_CONTEXT_CHARS),
        }
    }
}

impl Config {
    /// Built-in defaults with every value attributed to `ConfigSource::Default`.
    #[must_use]
    pub fn defaults_only() -> Self {
        let mut config = Self {
            defaults: Defaults::default(),
            generation: GenerationConfig::default(),
            verification: VerificationConfig::default(),
            refinement: RefinementConfig::default(),
            blueprints: BlueprintsConfig {
                dir: Some(DEFAULT_BLUEPRINTS_DIR.to_string()),
            },
            runs: RunsConfig {
                dir: Some(DEFAULT_RUNS_DIR.to_string()),
            },
            llm: LlmConfig {
                provider: Some(DEFAULT_PROVIDER.to_string()),
                ..LlmConfig::default()
            },
            config_path: None,
            source_attribution: HashMap::new(),
        };
        for key in ATTRIBUTED_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Default);
        }
        config
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.defaults.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    #[must_use]
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.defaults
                .call_timeout
                .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn max_regenerations(&self) -> u32 {
        self.generation
            .max_regenerations
            .unwrap_or(DEFAULT_MAX_REGENERATIONS)
    }

    #[must_use]
    pub fn context_char_budget(&self) -> usize {
        self.generation
            .context_char_budget
            .unwrap_or(DEFAULT_CONTEXT_CHAR_BUDGET)
    }

    #[must_use]
    pub fn excerpt_chars(&self) -> usize {
        self.generation.excerpt_chars.unwrap_or(DEFAULT_EXCERPT_CHARS)
    }

    #[must_use]
    pub fn default_target_words(&self) -> u32 {
        self.generation
            .default_target_words
            .unwrap_or(DEFAULT_TARGET_WORDS)
    }

    #[must_use]
    pub fn generation_temperature(&self) -> f32 {
        self.generation
            .temperature
            .unwrap_or(DEFAULT_GENERATION_TEMPERATURE)
    }

    #[must_use]
    pub fn verification_max_tokens(&self) -> u32 {
        self.verification
            .max_tokens
            .unwrap_or(DEFAULT_VERIFICATION_MAX_TOKENS)
    }

    #[must_use]
    pub fn verification_temperature(&self) -> f32 {
        self.verification
            .temperature
            .unwrap_or(DEFAULT_VERIFICATION_TEMPERATURE)
    }

    #[must_use]
    pub fn verifier_context_chars(&self) -> usize {
        self.verification
            .context_char_budget
            .unwrap_or(DEFAULT_VERIFIER_CONTEXT_CHARS)
    }

    #[must_use]
    pub fn refinement_iterations(&self) -> u32 {
        self.refinement
            .max_iterations
            .unwrap_or(DEFAULT_REFINEMENT_ITERATIONS)
    }

    #[must_use]
    pub fn refinement_temperature(&self) -> f32 {
        self.refinement
            .temperature
            .unwrap_or(DEFAULT_REFINEMENT_TEMPERATURE)
    }

    #[must_use]
    pub fn refinement_context_chars(&self) -> usize {
        self.refinement
            .context_char_budget
            .unwrap_or(DEFAULT_REFINEMENT_CONTEXT_CHARS)
    }

    #[must_use]
    pub fn blueprints_dir(&self) -> PathBuf {
        PathBuf::from(
            self.blueprints
                .dir
                .as_deref()
                .unwrap_or(DEFAULT_BLUEPRINTS_DIR),
        )
    }

    #[must_use]
    pub fn runs_dir(&self) -> PathBuf {
        PathBuf::from(self.runs.dir.as_deref().unwrap_or(DEFAULT_RUNS_DIR))
    }

    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

/// Keys tracked in `source_attribution`.
pub(crate) const ATTRIBUTED_KEYS: &[&str] = &[
    "model",
    "call_timeout",
    "verbose",
    "max_regenerations",
    "context_char_budget",
    "excerpt_chars",
    "default_target_words",
    "generation_temperature",
    "verification_max_tokens",
    "verification_temperature",
    "verification_context_chars",
    "refinement_max_iterations",
    "refinement_temperature",
    "refinement_context_chars",
    "blueprints_dir",
    "runs_dir",
    "llm_provider",
];
