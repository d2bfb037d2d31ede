//! Verify command implementation
//!
//! Handles `draftsmith verify` and `draftsmith verify --json`.

use anyhow::Result;

use draftsmith_engine::{PipelineSettings, Usage, VerificationResult};

use super::common::{build_pipeline, read_text, report_degradations};
use super::json_emit::emit_verification_json;
use crate::Config;
use crate::cli::args::VerifyArgs;

pub async fn execute_verify_command(
    args: &VerifyArgs,
    config: &Config,
    model_override: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(config, model_override, PipelineSettings::from_config(config))?;
    let document = read_text(&args.document)?;
    let context = match &args.context_file {
        Some(path) => read_text(path)?,
        None => String::new(),
    };

    let mut usage = Usage::default();
    let outcome = pipeline
        .verify_document(&args.blueprint, &document, &context, &mut usage)
        .await?;

    if args.json {
        println!("{}", emit_verification_json(outcome.value())?);
        return Ok(());
    }

    print_verification(outcome.value());
    report_degradations(outcome.reasons());
    Ok(())
}

/// Human-readable verification report on stdout.
pub fn print_verification(result: &VerificationResult) {
    if !result.is_available() {
        println!("Verification unavailable");
        for strength in &result.strengths {
            println!("  {strength}");
        }
        return;
    }

    let verdict = if result.ready_for_approval {
        "ready for approval"
    } else {
        "needs work"
    };
    println!("Overall: {:.2}/5 ({verdict})", result.overall_score);
    println!();
    for score in &result.scores {
        println!("  {:<28} {}/5  {}", score.name, score.score, score.level);
        if !score.feedback.is_empty() {
            println!("    {}", score.feedback);
        }
    }

    print_list("Strengths", &result.strengths);
    print_list("Weaknesses", &result.weaknesses);
    print_list("Suggested improvements", &result.specific_improvements);
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{heading}:");
    for item in items {
        println!("  - {item}");
    }
}
