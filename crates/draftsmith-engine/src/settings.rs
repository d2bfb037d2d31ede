//! Pipeline tuning resolved from configuration

use draftsmith_config::{
    Config, DEFAULT_CONTEXT_CHAR_BUDGET, DEFAULT_EXCERPT_CHARS, DEFAULT_GENERATION_TEMPERATURE,
    DEFAULT_MAX_REGENERATIONS, DEFAULT_REFINEMENT_CONTEXT_CHARS, DEFAULT_REFINEMENT_ITERATIONS,
    DEFAULT_REFINEMENT_TEMPERATURE, DEFAULT_TARGET_WORDS, DEFAULT_VERIFICATION_MAX_TOKENS,
    DEFAULT_VERIFICATION_TEMPERATURE, DEFAULT_VERIFIER_CONTEXT_CHARS,
};

/// Knobs every stage reads. Built once per pipeline from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_regenerations: u32,
    pub context_char_budget: usize,
    pub excerpt_chars: usize,
    pub default_target_words: u32,
    pub generation_temperature: f32,
    pub verification_max_tokens: u32,
    pub verification_temperature: f32,
    pub verifier_context_chars: usize,
    pub refinement_iterations: u32,
    pub refinement_temperature: f32,
    pub refinement_context_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_regenerations: DEFAULT_MAX_REGENERATIONS,
            context_char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            default_target_words: DEFAULT_TARGET_WORDS,
            generation_temperature: DEFAULT_GENERATION_TEMPERATURE,
            verification_max_tokens: DEFAULT_VERIFICATION_MAX_TOKENS,
            verification_temperature: DEFAULT_VERIFICATION_TEMPERATURE,
            verifier_context_chars: DEFAULT_VERIFIER_CONTEXT_CHARS,
            refinement_iterations: DEFAULT_REFINEMENT_ITERATIONS,
            refinement_temperature: DEFAULT_REFINEMENT_TEMPERATURE,
            refinement_context_chars: DEFAULT_REFINEMENT_CONTEXT_CHARS,
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_regenerations: config.max_regenerations(),
            context_char_budget: config.context_char_budget(),
            excerpt_chars: config.excerpt_chars(),
            default_target_words: config.default_target_words(),
            generation_temperature: config.generation_temperature(),
            verification_max_tokens: config.verification_max_tokens(),
            verification_temperature: config.verification_temperature(),
            verifier_context_chars: config.verifier_context_chars(),
            refinement_iterations: config.refinement_iterations(),
            refinement_temperature: config.refinement_temperature(),
            refinement_context_chars: config.refinement_context_chars(),
        }
    }
}
