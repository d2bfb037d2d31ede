//! Pipeline facade
//!
//! Ties the stages together behind the operations front ends call. Every
//! run works on a caller-owned [`GenerationRunState`]; the pipeline itself
//! holds only immutable collaborators and can serve any number of runs.

use draftsmith_blueprint::{Blueprint, BlueprintStore, UserInputs};
use draftsmith_config::Config;
use draftsmith_llm::{CompletionClient, LlmFallbackInfo};
use draftsmith_utils::error::DraftError;
use draftsmith_utils::logging::{log_stage_complete, run_span};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, warn};

use crate::assembler::assemble;
use crate::clarify::{ClarificationStage, ClarifyingAnswer, ClarifyingQuestion};
use crate::outcome::Outcome;
use crate::refine::{RefinementResult, RefinementStage, instructions_from_verification};
use crate::run_state::GenerationRunState;
use crate::run_store::{JsonRunStore, RunStore};
use crate::sections::SectionController;
use crate::self_refine::{DistillResult, SelfRefineAgent};
use crate::settings::PipelineSettings;
use crate::skeleton::SkeletonGenerator;
use crate::usage::Usage;
use crate::verifier::{VerificationResult, Verifier};

/// The assembled document of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResult {
    pub content: String,
    pub model_used: String,
    /// Sum over every call of the run
    pub tokens_used: u64,
    /// Section titles in document order
    pub sections_generated: Vec<String>,
}

/// Why [`DocumentPipeline::improve_until_ready`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementStop {
    Ready,
    VerificationUnavailable,
    MaxRounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub document: String,
    /// Refinement rounds applied
    pub rounds: u32,
    pub verification: VerificationResult,
    pub stop: ImprovementStop,
}

pub struct DocumentPipeline {
    client: CompletionClient,
    blueprints: Arc<BlueprintStore>,
    settings: PipelineSettings,
    runs: Option<Arc<dyn RunStore>>,
}

impl DocumentPipeline {
    #[must_use]
    pub fn new(
        client: CompletionClient,
        blueprints: Arc<BlueprintStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            blueprints,
            settings,
            runs: None,
        }
    }

    /// Persist run records to `store` after every generation.
    #[must_use]
    pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.runs = Some(store);
        self
    }

    /// Build the backend, blueprint store, run store and settings from
    /// configuration.
    ///
    /// # Errors
    ///
    /// `DraftError::Llm` when no provider can be constructed.
    pub fn from_config(config: &Config) -> Result<(Self, Option<LlmFallbackInfo>), DraftError> {
        let (client, fallback) = CompletionClient::from_config(config)?;
        let blueprints = Arc::new(BlueprintStore::new(Some(config.blueprints_dir())));
        let mut pipeline = Self::new(client, blueprints, PipelineSettings::from_config(config));

        if let Ok(dir) = camino::Utf8PathBuf::from_path_buf(config.runs_dir()) {
            pipeline = pipeline.with_run_store(Arc::new(JsonRunStore::new(dir)));
        } else {
            warn!("Runs directory is not valid UTF-8; run records will not be saved");
        }
        Ok((pipeline, fallback))
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn blueprints(&self) -> &BlueprintStore {
        &self.blueprints
    }

    /// Load a blueprint by name.
    ///
    /// # Errors
    ///
    /// Any `BlueprintError` from the store.
    pub fn blueprint(&self, name: &str) -> Result<Arc<Blueprint>, DraftError> {
        Ok(self.blueprints.load(name)?)
    }

    /// Generate a document with a fresh run state.
    ///
    /// # Errors
    ///
    /// See [`DocumentPipeline::run_generation`].
    pub async fn generate_document(
        &self,
        blueprint_name: &str,
        user_inputs: &UserInputs,
        context: &str,
    ) -> Result<Outcome<DraftResult>, DraftError> {
        let mut state = GenerationRunState::new(blueprint_name, user_inputs.clone());
        self.run_generation(&mut state, context).await
    }

    /// Outline, draft and assemble the document described by `state`.
    ///
    /// The state records the draft, usage and every degradation, ends
    /// `completed` or `failed`, and is saved when a run store is attached.
    ///
    /// # Errors
    ///
    /// Blueprint errors, `InvalidInputs` when the inputs fail validation,
    /// and backend failures the stages could not absorb.
    pub async fn run_generation(
        &self,
        state: &mut GenerationRunState,
        context: &str,
    ) -> Result<Outcome<DraftResult>, DraftError> {
        let span = run_span(&state.run_id, &state.blueprint);
        let result = self.generate_inner(state, context).instrument(span).await;

        if let Err(e) = &result {
            state.fail(e.to_string());
        }
        self.persist(state);
        result
    }

    async fn generate_inner(
        &self,
        state: &mut GenerationRunState,
        context: &str,
    ) -> Result<Outcome<DraftResult>, DraftError> {
        let started = Instant::now();
        let blueprint = self.blueprint(&state.blueprint)?;

        let issues = blueprint.validate_inputs(&state.user_inputs);
        if !issues.is_empty() {
            return Err(DraftError::InvalidInputs {
                blueprint: blueprint.name.clone(),
                issues,
            });
        }

        let mut usage = Usage::default();
        let mut reasons = Vec::new();

        let skeleton = SkeletonGenerator::new(&self.client, &self.settings)
            .generate(&blueprint, context, &state.user_inputs, &mut usage)
            .await;
        let (skeleton, skeleton_reasons) = match skeleton {
            Ok(outcome) => outcome.into_parts(),
            Err(e) => {
                state.usage.absorb(usage);
                return Err(e.into());
            }
        };
        reasons.extend(skeleton_reasons);

        let sections = SectionController::new(&self.client, &self.settings)
            .with_strategic_summary(state.step_back_summary.as_deref())
            .generate_all(
                &blueprint,
                &skeleton,
                &state.user_inputs,
                context,
                self.settings.max_regenerations,
                &mut usage,
            )
            .await;
        let (sections, section_reasons) = match sections {
            Ok(outcome) => outcome.into_parts(),
            Err(e) => {
                state.usage.absorb(usage);
                return Err(e);
            }
        };
        reasons.extend(section_reasons);

        let content = assemble(&blueprint, &sections.by_id());
        let model_used = usage.model_used.clone().unwrap_or_default();
        let draft = DraftResult {
            content: content.clone(),
            model_used: model_used.clone(),
            tokens_used: usage.tokens,
            sections_generated: sections.titles(),
        };

        let calls = usage.calls;
        state.initial_draft = Some(content);
        state.model_used = Some(model_used);
        state.usage.absorb(usage);
        state.record_degradations(reasons.iter().cloned());
        state.complete();

        log_stage_complete("generate", calls, started.elapsed().as_millis());
        info!(
            sections = draft.sections_generated.len(),
            tokens_used = draft.tokens_used,
            degraded = !reasons.is_empty(),
            "Document generated"
        );
        Ok(Outcome::from_reasons(draft, reasons))
    }

    /// Score a document against the named blueprint's rubric.
    ///
    /// # Errors
    ///
    /// `MissingRubric` and other blueprint errors, and backend failures.
    pub async fn verify_document(
        &self,
        blueprint_name: &str,
        document_text: &str,
        context: &str,
        usage: &mut Usage,
    ) -> Result<Outcome<VerificationResult>, DraftError> {
        self.verify_with_inputs(blueprint_name, document_text, context, &UserInputs::new(), usage)
            .await
    }

    /// [`DocumentPipeline::verify_document`] with the user's inputs as
    /// grounding.
    ///
    /// # Errors
    ///
    /// See [`DocumentPipeline::verify_document`].
    pub async fn verify_with_inputs(
        &self,
        blueprint_name: &str,
        document_text: &str,
        context: &str,
        inputs: &UserInputs,
        usage: &mut Usage,
    ) -> Result<Outcome<VerificationResult>, DraftError> {
        let blueprint = self.blueprint(blueprint_name)?;
        Verifier::new(&self.client, &self.settings)
            .verify(&blueprint, document_text, context, inputs, usage)
            .await
    }

    /// Revise a document with the configured number of iterations.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub async fn refine_document(
        &self,
        document_text: &str,
        instructions: &[String],
        context: &str,
        usage: &mut Usage,
    ) -> Result<Outcome<RefinementResult>, DraftError> {
        RefinementStage::new(&self.client, &self.settings)
            .refine(
                document_text,
                instructions,
                context,
                self.settings.refinement_iterations,
                usage,
            )
            .await
    }

    /// Clarifying questions for a blueprint and partial inputs.
    ///
    /// # Errors
    ///
    /// Blueprint errors and fatal backend failures.
    pub async fn clarify(
        &self,
        blueprint_name: &str,
        inputs: &UserInputs,
        context: &str,
        usage: &mut Usage,
    ) -> Result<Outcome<Vec<ClarifyingQuestion>>, DraftError> {
        let blueprint = self.blueprint(blueprint_name)?;
        ClarificationStage::new(&self.client, &self.settings)
            .questions(&blueprint, inputs, context, usage)
            .await
    }

    /// Fold clarifying answers into the run's step-back summary.
    ///
    /// # Errors
    ///
    /// Blueprint errors and fatal backend failures.
    pub async fn summarize_answers(
        &self,
        state: &mut GenerationRunState,
        answers: &[ClarifyingAnswer],
        context: &str,
    ) -> Result<Outcome<String>, DraftError> {
        let blueprint = self.blueprint(&state.blueprint)?;
        let mut usage = Usage::default();
        let outcome = ClarificationStage::new(&self.client, &self.settings)
            .step_back_summary(&blueprint, &state.user_inputs, answers, context, &mut usage)
            .await;
        state.usage.absorb(usage);

        let outcome = outcome?;
        state.step_back_summary = Some(outcome.value().clone());
        state.record_degradations(outcome.reasons().iter().cloned());
        Ok(outcome)
    }

    /// Score the run's latest draft and record the result on the run.
    ///
    /// # Errors
    ///
    /// `InvalidInputs` when the run has no draft yet, blueprint errors and
    /// backend failures.
    pub async fn verify_run(
        &self,
        state: &mut GenerationRunState,
        context: &str,
    ) -> Result<Outcome<VerificationResult>, DraftError> {
        let Some(draft) = state.latest_draft().map(str::to_owned) else {
            return Err(DraftError::InvalidInputs {
                blueprint: state.blueprint.clone(),
                issues: vec!["run has no draft to verify".to_string()],
            });
        };

        let mut usage = Usage::default();
        let outcome = self
            .verify_with_inputs(&state.blueprint, &draft, context, &state.user_inputs, &mut usage)
            .instrument(run_span(&state.run_id, &state.blueprint))
            .await;
        state.usage.absorb(usage);

        let outcome = outcome?;
        state.verification = Some(outcome.value().clone());
        state.record_degradations(outcome.reasons().iter().cloned());
        self.persist(state);
        Ok(outcome)
    }

    /// Verify, refine with the verifier's feedback, and repeat.
    ///
    /// Stops when the document is ready for approval, when verification is
    /// unavailable, or after `max_rounds` refinements.
    ///
    /// # Errors
    ///
    /// Blueprint errors and backend failures.
    pub async fn improve_until_ready(
        &self,
        blueprint_name: &str,
        document_text: &str,
        context: &str,
        max_rounds: u32,
        usage: &mut Usage,
    ) -> Result<Outcome<ImprovementReport>, DraftError> {
        let blueprint = self.blueprint(blueprint_name)?;
        let verifier = Verifier::new(&self.client, &self.settings);
        let refiner = RefinementStage::new(&self.client, &self.settings);
        let inputs = UserInputs::new();

        let mut document = document_text.to_string();
        let mut rounds = 0;
        let mut reasons = Vec::new();

        loop {
            let (verification, verify_reasons) = verifier
                .verify(&blueprint, &document, context, &inputs, usage)
                .await?
                .into_parts();
            reasons.extend(verify_reasons);

            let stop = if verification.ready_for_approval {
                Some(ImprovementStop::Ready)
            } else if !verification.is_available() {
                Some(ImprovementStop::VerificationUnavailable)
            } else if rounds >= max_rounds {
                Some(ImprovementStop::MaxRounds)
            } else {
                None
            };
            if let Some(stop) = stop {
                info!(rounds, stop = ?stop, overall_score = verification.overall_score, "Improvement loop finished");
                return Ok(Outcome::from_reasons(
                    ImprovementReport {
                        document,
                        rounds,
                        verification,
                        stop,
                    },
                    reasons,
                ));
            }

            let instructions = instructions_from_verification(&verification);
            let (refined, refine_reasons) = refiner
                .refine(
                    &document,
                    &instructions,
                    context,
                    self.settings.refinement_iterations,
                    usage,
                )
                .await?
                .into_parts();
            reasons.extend(refine_reasons);
            document = refined.refined_text;
            rounds += 1;
        }
    }

    /// Distill a long summary with the self-critique loop.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub async fn distill(
        &self,
        summary: &str,
        max_iterations: u32,
        usage: &mut Usage,
    ) -> Result<Outcome<DistillResult>, DraftError> {
        SelfRefineAgent::new(&self.client, &self.settings)
            .distill(summary, max_iterations, usage)
            .await
    }

    fn persist(&self, state: &GenerationRunState) {
        if let Some(store) = &self.runs
            && let Err(e) = store.save(state)
        {
            warn!(run_id = %state.run_id, error = %e, "Failed to save run record");
        }
    }
}
