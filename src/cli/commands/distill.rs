//! Distill command implementation
//!
//! Handles `draftsmith distill`.

use anyhow::Result;

use draftsmith_engine::{PipelineSettings, StopReason, Usage};

use super::common::{build_pipeline, read_text, report_degradations};
use crate::Config;
use crate::cli::args::DistillArgs;

pub async fn execute_distill_command(
    args: &DistillArgs,
    config: &Config,
    model_override: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(config, model_override, PipelineSettings::from_config(config))?;
    let summary = read_text(&args.summary_file)?;

    let mut usage = Usage::default();
    let outcome = pipeline
        .distill(&summary, args.iterations, &mut usage)
        .await?;
    let (result, reasons) = outcome.into_parts();

    println!("{}", result.text);
    report_degradations(&reasons);

    let stop = match result.stop_reason {
        StopReason::Satisfied => "evaluator satisfied",
        StopReason::MaxIterations => "iteration limit reached",
        StopReason::EvaluationUnavailable => "evaluation unavailable",
    };
    eprintln!(
        "✓ Distilled in {} refinement(s), {stop} ({} call(s))",
        result.iterations, usage.calls
    );
    Ok(())
}
