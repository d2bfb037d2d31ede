//! Blueprint data model
//!
//! A blueprint is the immutable description of one document type: ordered
//! sections, the inputs a user must supply, and the rubric a finished
//! document is scored against. Section ids key every later stage (outline,
//! drafting, assembly), so they are unique and never renamed after load.

use draftsmith_utils::error::BlueprintError;
use serde::{Deserialize, Serialize};

use crate::prompt_config::PromptConfig;

/// Weight used for a rubric criterion that declares none.
pub const NOMINAL_CRITERION_WEIGHT: f64 = 1.0;

/// Passing score used when a rubric declares none.
pub const DEFAULT_PASSING_SCORE: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub rubric: Option<Rubric>,
    #[serde(default)]
    pub verification_questions: Vec<String>,
    /// Embedded prompt configuration; a companion `<name>.prompt.yaml`
    /// replaces it at load time.
    #[serde(default)]
    pub prompt_config: PromptConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Textarea,
    Number,
    Date,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub id: String,
    pub label: String,
    #[serde(default, rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: Option<InputValidation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValidation {
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub criteria: Vec<Criterion>,
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
}

fn default_passing_score() -> f64 {
    DEFAULT_PASSING_SCORE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl Criterion {
    #[must_use]
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(NOMINAL_CRITERION_WEIGHT)
    }
}

impl Rubric {
    #[must_use]
    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }
}

impl Blueprint {
    /// Sections sorted by ascending `order`; ties keep declaration order.
    #[must_use]
    pub fn sections_in_order(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }

    #[must_use]
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Section ids in document order.
    #[must_use]
    pub fn section_ids(&self) -> Vec<&str> {
        self.sections_in_order()
            .into_iter()
            .map(|s| s.id.as_str())
            .collect()
    }

    /// The rubric, required by verification.
    ///
    /// # Errors
    ///
    /// Returns `BlueprintError::MissingRubric` when none is declared.
    pub fn rubric(&self) -> Result<&Rubric, BlueprintError> {
        self.rubric
            .as_ref()
            .ok_or_else(|| BlueprintError::MissingRubric {
                name: self.name.clone(),
            })
    }

    #[must_use]
    pub fn required_inputs(&self) -> Vec<&InputSpec> {
        self.inputs.iter().filter(|i| i.required).collect()
    }

    /// Word target for a section; see [`PromptConfig::target_words`].
    #[must_use]
    pub fn target_words(&self, section_id: &str, fallback: u32) -> u32 {
        self.prompt_config.target_words(section_id, fallback)
    }
}
