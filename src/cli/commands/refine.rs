//! Refine command implementation
//!
//! Handles `draftsmith refine`.

use anyhow::Result;

use draftsmith_engine::{
    PipelineSettings, Usage, VerificationResult, instructions_from_verification,
};
use draftsmith_utils::error::ConfigError;

use super::common::{build_pipeline, read_json, read_text, report_degradations, write_or_print};
use crate::cli::args::RefineArgs;
use crate::{Config, DraftError};

pub async fn execute_refine_command(
    args: &RefineArgs,
    config: &Config,
    model_override: Option<&str>,
) -> Result<()> {
    let instructions = collect_instructions(args)?;

    let mut settings = PipelineSettings::from_config(config);
    if let Some(iterations) = args.iterations {
        settings.refinement_iterations = iterations;
    }
    let pipeline = build_pipeline(config, model_override, settings)?;
    let document = read_text(&args.document)?;

    let mut usage = Usage::default();
    let outcome = pipeline
        .refine_document(&document, &instructions, "", &mut usage)
        .await?;
    let (result, reasons) = outcome.into_parts();

    write_or_print(args.output.as_deref(), &result.refined_text)?;
    report_degradations(&reasons);
    eprintln!(
        "✓ {} ({} iteration(s), {} token(s))",
        result.summary, result.iterations, result.tokens
    );
    Ok(())
}

/// `--instruction` values first, then those derived from `--from-verification`.
fn collect_instructions(args: &RefineArgs) -> Result<Vec<String>> {
    let mut instructions: Vec<String> = args
        .instructions
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(path) = &args.from_verification {
        let verification: VerificationResult = read_json(path)?;
        for instruction in instructions_from_verification(&verification) {
            if !instructions.contains(&instruction) {
                instructions.push(instruction);
            }
        }
    }

    if instructions.is_empty() {
        return Err(DraftError::Config(ConfigError::MissingRequired(
            "--instruction or --from-verification with at least one suggestion".to_string(),
        ))
        .into());
    }
    Ok(instructions)
}
