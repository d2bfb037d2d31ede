//! Document generation pipeline for draftsmith
//!
//! Stages, leaf first:
//!
//! - [`context`]: bounded background context
//! - [`clarify`]: clarifying questions and the step-back summary
//! - [`skeleton`]: one-pass outline covering every section
//! - [`sections`]: the per-section drafting loop with word and name checks
//! - [`assembler`]: deterministic markdown assembly
//! - [`verifier`]: rubric scoring
//! - [`refine`] and [`self_refine`]: revision loops
//!
//! [`DocumentPipeline`] wires them together over a caller-owned
//! [`GenerationRunState`].

pub mod assembler;
pub mod clarify;
pub mod context;
pub mod hallucination;
pub mod outcome;
pub mod pipeline;
mod prompts;
pub mod refine;
pub mod run_state;
pub mod run_store;
pub mod sections;
pub mod self_refine;
pub mod settings;
pub mod skeleton;
pub mod usage;
pub mod verifier;

pub use assembler::assemble;
pub use clarify::{ClarificationStage, ClarifyingAnswer, ClarifyingQuestion, fallback_questions};
pub use context::{
    AggregatedContext, ContextAggregator, ContextItem, ContextProvider, DirectoryContextProvider,
    truncate_for_prompt,
};
pub use hallucination::{find_suspect_names, find_ungrounded_names, has_hallucination};
pub use outcome::Outcome;
pub use pipeline::{DocumentPipeline, DraftResult, ImprovementReport, ImprovementStop};
pub use prompts::{anti_hallucination_block, system_prompt};
pub use refine::{RefinementResult, RefinementStage, instructions_from_verification};
pub use run_state::{GenerationRunState, RunStatus};
pub use run_store::{JsonRunStore, RunStore};
pub use sections::{GeneratedSections, SectionContent, SectionController, word_ceiling};
pub use self_refine::{DistillResult, SelfRefineAgent, StopReason};
pub use settings::PipelineSettings;
pub use skeleton::{Skeleton, SkeletonEntry, SkeletonGenerator, parse_skeleton};
pub use usage::Usage;
pub use verifier::{
    CriterionScore, READY_THRESHOLD, VerificationResult, Verifier, compute_overall,
    parse_verification, score_level,
};
