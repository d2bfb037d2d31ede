//! Blueprints: the declarative description of a document type
//!
//! A [`Blueprint`] lists ordered sections, required inputs and a weighted
//! rubric. Its [`PromptConfig`] carries drafting guidance and per-section
//! word targets. [`BlueprintStore`] resolves names against a directory and
//! the built-in set and caches what it loads.

mod inputs;
mod model;
mod prompt_config;
mod store;
mod validation;

pub use draftsmith_utils::error::BlueprintError;
pub use inputs::UserInputs;
pub use model::{
    Blueprint, Criterion, DEFAULT_PASSING_SCORE, InputSpec, InputType, InputValidation,
    NOMINAL_CRITERION_WEIGHT, Rubric, Section, Subsection,
};
pub use prompt_config::{
    DEFAULT_ANTI_HALLUCINATION_RULES, PROPOSAL_WORD_TARGETS, PromptConfig,
};
pub use store::{
    BLUEPRINT_BUSINESS_PROPOSAL, BLUEPRINT_MARKET_ANALYSIS, BLUEPRINT_PROJECT_CHARTER,
    BUILT_IN_BLUEPRINTS, BlueprintStore, load_from_path,
};
