//! Typed prompt configuration
//!
//! Every field has an explicit default, so a blueprint without a companion
//! file still drafts with sensible guidance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Word targets for the proposal-style section ids, used when a blueprint
/// does not configure its own.
pub const PROPOSAL_WORD_TARGETS: &[(&str, u32)] = &[
    ("executive_summary", 150),
    ("problem_statement", 200),
    ("proposed_solution", 300),
    ("implementation_plan", 250),
    ("timeline", 150),
    ("budget", 150),
    ("risks", 200),
    ("conclusion", 100),
];

pub const DEFAULT_ROLE: &str = "an experienced business writer";
pub const DEFAULT_TONE: &str = "professional and concise";

pub const DEFAULT_ANTI_HALLUCINATION_RULES: &[&str] = &[
    "Do not invent names of people, organizations or products that are not in the provided facts.",
    "Do not invent numbers, dates, budgets or percentages that are not in the provided facts.",
    "Do not attribute credentials, titles or degrees to anyone unless the facts state them.",
    "When a detail is unknown, describe it generically or mark it as to be confirmed.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub role: String,
    pub goals: Vec<String>,
    pub constraints: Vec<String>,
    pub tone: String,
    /// Per-section word targets keyed by section id
    pub section_word_targets: BTreeMap<String, u32>,
    pub default_target_words: Option<u32>,
    pub anti_hallucination_rules: Vec<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            role: DEFAULT_ROLE.to_string(),
            goals: Vec::new(),
            constraints: Vec::new(),
            tone: DEFAULT_TONE.to_string(),
            section_word_targets: BTreeMap::new(),
            default_target_words: None,
            anti_hallucination_rules: DEFAULT_ANTI_HALLUCINATION_RULES
                .iter()
                .map(|r| (*r).to_string())
                .collect(),
        }
    }
}

impl PromptConfig {
    /// Word target for a section.
    ///
    /// Resolution: `section_word_targets`, then `default_target_words`,
    /// then [`PROPOSAL_WORD_TARGETS`], then `fallback`. Anything the
    /// blueprint configures wins over the built-in proposal table.
    #[must_use]
    pub fn target_words(&self, section_id: &str, fallback: u32) -> u32 {
        if let Some(words) = self.section_word_targets.get(section_id) {
            return *words;
        }
        if let Some(words) = self.default_target_words {
            return words;
        }
        PROPOSAL_WORD_TARGETS
            .iter()
            .find(|(id, _)| *id == section_id)
            .map_or(fallback, |(_, words)| *words)
    }

    /// Load-time checks; returns human-readable problems.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (id, words) in &self.section_word_targets {
            if !(1..=5000).contains(words) {
                problems.push(format!(
                    "word target for section '{id}' must be between 1 and 5000, got {words}"
                ));
            }
        }
        if let Some(words) = self.default_target_words
            && !(1..=5000).contains(&words)
        {
            problems.push(format!(
                "default_target_words must be between 1 and 5000, got {words}"
            ));
        }
        if self.role.trim().is_empty() {
            problems.push("role must not be empty".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_resolution_order() {
        let mut config = PromptConfig::default();
        assert_eq!(config.target_words("budget", 200), 150);
        assert_eq!(config.target_words("appendix", 200), 200);

        config.default_target_words = Some(120);
        assert_eq!(config.target_words("appendix", 200), 120);
        assert_eq!(config.target_words("conclusion", 200), 120);

        config
            .section_word_targets
            .insert("conclusion".to_string(), 60);
        assert_eq!(config.target_words("conclusion", 200), 60);
    }

    #[test]
    fn test_configured_default_beats_proposal_table_on_shared_ids() {
        let config = PromptConfig {
            default_target_words: Some(400),
            ..PromptConfig::default()
        };
        for id in ["risks", "budget", "timeline", "conclusion"] {
            assert_eq!(config.target_words(id, 200), 400, "section {id}");
        }
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: PromptConfig =
            serde_yaml::from_str("goals:\n  - Win funding\nsection_word_targets:\n  intro: 50\n")
                .unwrap();
        assert_eq!(config.role, DEFAULT_ROLE);
        assert_eq!(config.goals, vec!["Win funding"]);
        assert_eq!(
            config.anti_hallucination_rules.len(),
            DEFAULT_ANTI_HALLUCINATION_RULES.len()
        );
        assert_eq!(config.target_words("intro", 200), 50);
    }

    #[test]
    fn test_problems_flag_out_of_range_targets() {
        let mut config = PromptConfig::default();
        config.section_word_targets.insert("intro".to_string(), 0);
        config.default_target_words = Some(9000);
        assert_eq!(config.problems().len(), 2);
        assert!(PromptConfig::default().problems().is_empty());
    }
}
