use std::collections::BTreeMap;

use draftsmith_utils::types::ConfigSource;

use crate::Config;

impl Config {
    /// Effective configuration as `key -> (value, source)` pairs.
    ///
    /// Keys without an explicit attribution are reported as `default`.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut out = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            let source = self
                .source_attribution
                .get(key)
                .copied()
                .unwrap_or(ConfigSource::Default);
            out.insert(key.to_string(), (value, source.to_string()));
        };

        add("model", self.model().to_string());
        add("call_timeout", self.call_timeout().as_secs().to_string());
        add("verbose", self.verbose().to_string());
        add("max_regenerations", self.max_regenerations().to_string());
        add("context_char_budget", self.context_char_budget().to_string());
        add("excerpt_chars", self.excerpt_chars().to_string());
        add("default_target_words", self.default_target_words().to_string());
        add(
            "generation_temperature",
            self.generation_temperature().to_string(),
        );
        add(
            "verification_max_tokens",
            self.verification_max_tokens().to_string(),
        );
        add(
            "verification_temperature",
            self.verification_temperature().to_string(),
        );
        add(
            "verification_context_chars",
            self.verifier_context_chars().to_string(),
        );
        add(
            "refinement_max_iterations",
            self.refinement_iterations().to_string(),
        );
        add(
            "refinement_temperature",
            self.refinement_temperature().to_string(),
        );
        add(
            "refinement_context_chars",
            self.refinement_context_chars().to_string(),
        );
        add("blueprints_dir", self.blueprints_dir().display().to_string());
        add("runs_dir", self.runs_dir().display().to_string());
        add("llm_provider", self.llm_provider().to_string());
        if let Some(fallback) = &self.llm.fallback_provider {
            add("llm_fallback_provider", fallback.clone());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_reports_sources() {
        let config = Config::builder().max_regenerations(3).build().unwrap();
        let effective = config.effective_config();

        assert_eq!(
            effective["max_regenerations"],
            ("3".to_string(), "programmatic".to_string())
        );
        assert_eq!(effective["excerpt_chars"].1, "default");
        assert!(!effective.contains_key("llm_fallback_provider"));
    }
}
