//! Generate command implementation
//!
//! Handles `draftsmith generate` and `draftsmith generate --json`.

use anyhow::Result;
use std::time::Instant;
use tracing::info;

use draftsmith_engine::{ClarifyingAnswer, GenerationRunState, PipelineSettings};

use super::common::{
    build_pipeline, gather_context, load_inputs, read_json, report_degradations, write_or_print,
};
use super::json_emit::{GenerateJsonOutput, emit_generate_json};
use super::verify::print_verification;
use crate::Config;
use crate::cli::args::GenerateArgs;

pub async fn execute_generate_command(
    args: &GenerateArgs,
    config: &Config,
    model_override: Option<&str>,
) -> Result<()> {
    let started = Instant::now();
    let pipeline = build_pipeline(config, model_override, PipelineSettings::from_config(config))?;

    let inputs = load_inputs(&args.inputs, args.inputs_file.as_deref())?;
    let project = args
        .project
        .as_deref()
        .zip(args.context_root.as_deref());
    let context = gather_context(
        &args.context_files,
        project,
        pipeline.settings().context_char_budget,
    )?;

    let mut state = GenerationRunState::new(&args.blueprint, inputs);
    info!(run_id = %state.run_id, blueprint = %args.blueprint, "Starting generation");

    if let Some(path) = &args.answers_file {
        let answers: Vec<ClarifyingAnswer> = read_json(path)?;
        pipeline
            .summarize_answers(&mut state, &answers, &context)
            .await?;
    }

    let outcome = pipeline.run_generation(&mut state, &context).await?;
    let draft = outcome.into_value();

    if args.verify {
        pipeline.verify_run(&mut state, &context).await?;
    }

    if args.json {
        let output = GenerateJsonOutput::new(&state, &draft.content, &draft.sections_generated);
        println!("{}", emit_generate_json(&output)?);
        return Ok(());
    }

    write_or_print(args.output.as_deref(), &draft.content)?;
    report_degradations(&state.degradations);
    if let Some(verification) = &state.verification {
        print_verification(verification);
    }

    eprintln!(
        "✓ Run {} completed: {} section(s), {} call(s), {} token(s) in {:.1}s",
        state.run_id,
        draft.sections_generated.len(),
        state.usage.calls,
        state.usage.tokens,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
