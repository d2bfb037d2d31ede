//! Clarify command implementation
//!
//! Handles `draftsmith clarify` and `draftsmith clarify --json`.

use anyhow::Result;

use draftsmith_engine::{PipelineSettings, Usage};

use super::common::{build_pipeline, load_inputs, report_degradations};
use super::json_emit::{ClarifyJsonOutput, emit_clarify_json};
use crate::Config;
use crate::cli::args::ClarifyArgs;

pub async fn execute_clarify_command(
    args: &ClarifyArgs,
    config: &Config,
    model_override: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(config, model_override, PipelineSettings::from_config(config))?;
    let inputs = load_inputs(&args.inputs, None)?;

    let mut usage = Usage::default();
    let outcome = pipeline
        .clarify(&args.blueprint, &inputs, "", &mut usage)
        .await?;

    if args.json {
        let output = ClarifyJsonOutput {
            blueprint: &args.blueprint,
            questions: outcome.value(),
            degraded: outcome.is_degraded(),
        };
        println!("{}", emit_clarify_json(&output)?);
        return Ok(());
    }

    for (i, question) in outcome.value().iter().enumerate() {
        println!("{}. {}", i + 1, question.question);
        if !question.rationale.is_empty() {
            println!("   ({})", question.rationale);
        }
    }
    report_degradations(outcome.reasons());
    Ok(())
}
