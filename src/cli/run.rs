//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Initializes tracing and creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use anyhow::Result;
use clap::Parser;

use draftsmith_utils::logging::init_tracing;
use draftsmith_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;
use crate::{CliArgs, Config, DraftError, ExitCode};

/// Main CLI execution function.
///
/// Handles ALL output including errors and returns `Err(ExitCode)` on
/// failure. main.rs only calls `std::process::exit(code.as_i32())`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let cli_args = cli_args_from(&cli);

    if let Err(e) = init_tracing(cli.verbose, cli.log_json) {
        eprintln!("✗ Failed to initialize logging: {e}");
    }

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = DraftError::Config(err);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let model = cli.model.as_deref();
    let result = rt.block_on(async {
        match &cli.command {
            Commands::Generate(args) => {
                commands::execute_generate_command(args, &config, model).await
            }
            Commands::Verify(args) => commands::execute_verify_command(args, &config, model).await,
            Commands::Refine(args) => commands::execute_refine_command(args, &config, model).await,
            Commands::Clarify(args) => {
                commands::execute_clarify_command(args, &config, model).await
            }
            Commands::Distill(args) => {
                commands::execute_distill_command(args, &config, model).await
            }
            Commands::Blueprints(cmd) => commands::execute_blueprints_command(cmd, &config),
        }
    });

    match result {
        Ok(()) => Ok(()),
        Err(error) => Err(report_error(&error)),
    }
}

/// Map parsed flags onto the configuration layer.
///
/// `--max-regenerations` belongs to `generate` but is resolved through
/// config like the global flags.
pub(crate) fn cli_args_from(cli: &Cli) -> CliArgs {
    let max_regenerations = match &cli.command {
        Commands::Generate(args) => args.max_regenerations,
        _ => None,
    };
    CliArgs {
        config_path: cli.config.clone(),
        model: cli.model.clone(),
        verbose: Some(cli.verbose),
        call_timeout: cli.call_timeout,
        max_regenerations,
        llm_provider: cli.llm_provider.clone(),
        blueprints_dir: None,
        runs_dir: None,
    }
}

/// Print `error` for the user and pick the exit code.
fn report_error(error: &anyhow::Error) -> ExitCode {
    if let Some(draft_error) = error.downcast_ref::<DraftError>() {
        eprintln!("{}", draft_error.display_for_user());
        return draft_error.to_exit_code();
    }

    eprintln!("✗ {}", redact_error_message(&format!("{error:#}")));
    if let Some(suggestions) = enhance_error_context(error) {
        eprintln!("\n  Suggestions:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, suggestion);
        }
    }
    ExitCode::INTERNAL
}

/// Enhance error reporting for common failure scenarios
fn enhance_error_context(error: &anyhow::Error) -> Option<Vec<String>> {
    let error_str = format!("{error:#}");

    if error_str.contains("Invalid JSON") {
        Some(vec![
            "--inputs-file must hold a JSON object of strings".to_string(),
            "--answers-file must hold an array of {\"question\", \"answer\"} objects".to_string(),
        ])
    } else if error_str.contains("Project directory not found") {
        Some(vec![
            "Check --context-root points at the folder holding project directories".to_string(),
            "Project context lives under <root>/<project>/notes, documents and files".to_string(),
        ])
    } else if error_str.contains("Permission denied") {
        Some(vec![
            "Check file and directory permissions".to_string(),
            "Ensure you have write access to the output and runs directories".to_string(),
        ])
    } else if error_str.contains("No such file or directory") {
        Some(vec![
            "Verify the specified paths exist".to_string(),
            "Check that you're running from the correct directory".to_string(),
        ])
    } else {
        None
    }
}
