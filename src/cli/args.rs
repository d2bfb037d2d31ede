//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// draftsmith - blueprint-driven business document generation
#[derive(Debug, Parser)]
#[command(name = "draftsmith")]
#[command(about = "Generate, verify and refine business documents from blueprints using LLM providers")]
#[command(long_about = r#"
draftsmith turns a blueprint (ordered sections, inputs and a scoring rubric)
plus your answers into a complete markdown document. Each section is drafted
separately, checked for length and invented names, and regenerated when it
falls short.

EXAMPLES:
  # List the available blueprints
  draftsmith blueprints list

  # Generate a proposal from inline inputs
  draftsmith generate --blueprint business-proposal \
      --input company_name=Acme --input problem="Slow invoicing" --output proposal.md

  # Generate with project context and verify the result
  draftsmith generate --blueprint project-charter --inputs-file inputs.json \
      --project acme --context-root ./projects --verify

  # Score an existing document against a blueprint rubric
  draftsmith verify --blueprint business-proposal --document proposal.md --json

  # Apply the verifier's suggestions
  draftsmith refine --document proposal.md --from-verification verification.json

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  Config file is discovered by searching upward from CWD for .draftsmith/config.toml
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to use for LLM provider calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as newline-delimited JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// LLM provider to use (anthropic or openrouter)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    pub call_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a document from a blueprint
    ///
    /// Drafts an outline, then every section in blueprint order, and writes
    /// the assembled markdown to --output or stdout.
    ///
    /// EXAMPLES:
    ///   draftsmith generate --blueprint business-proposal --input company_name=Acme
    ///   draftsmith generate --blueprint project-charter --inputs-file inputs.json --verify
    Generate(GenerateArgs),

    /// Score a document against a blueprint's rubric
    Verify(VerifyArgs),

    /// Revise a document from instructions or a saved verification result
    Refine(RefineArgs),

    /// Ask clarifying questions before generating
    Clarify(ClarifyArgs),

    /// Condense a summary into a short executive summary
    Distill(DistillArgs),

    /// Inspect available blueprints
    #[command(subcommand)]
    Blueprints(BlueprintCommands),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Blueprint name (built-in or from the blueprints directory)
    #[arg(long)]
    pub blueprint: String,

    /// User input as key=value (repeatable)
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub inputs: Vec<(String, String)>,

    /// JSON object of user inputs; --input values win on conflict
    #[arg(long)]
    pub inputs_file: Option<PathBuf>,

    /// Free-text context file (repeatable, concatenated in order)
    #[arg(long = "context-file")]
    pub context_files: Vec<PathBuf>,

    /// Project id whose notes and documents provide context
    #[arg(long, requires = "context_root")]
    pub project: Option<String>,

    /// Directory holding one folder per project
    #[arg(long, requires = "project")]
    pub context_root: Option<PathBuf>,

    /// JSON array of {question, answer} pairs for a step-back summary
    #[arg(long)]
    pub answers_file: Option<PathBuf>,

    /// Regeneration attempts per section after the first
    #[arg(long)]
    pub max_regenerations: Option<u32>,

    /// Write the document here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Score the generated document against the rubric
    #[arg(long)]
    pub verify: bool,

    /// Output the run result as JSON (JCS canonical form)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub blueprint: String,

    /// Markdown document to score
    #[arg(long)]
    pub document: PathBuf,

    #[arg(long = "context-file")]
    pub context_file: Option<PathBuf>,

    /// Output the verification result as JSON (JCS canonical form)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RefineArgs {
    /// Markdown document to revise
    #[arg(long)]
    pub document: PathBuf,

    /// Revision instruction (repeatable)
    #[arg(long = "instruction")]
    pub instructions: Vec<String>,

    /// Verification JSON whose weaknesses and improvements become instructions
    #[arg(long)]
    pub from_verification: Option<PathBuf>,

    /// Revision passes (default from config)
    #[arg(long)]
    pub iterations: Option<u32>,

    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClarifyArgs {
    #[arg(long)]
    pub blueprint: String,

    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub inputs: Vec<(String, String)>,

    /// Output the questions as JSON (JCS canonical form)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DistillArgs {
    /// File holding the summary to condense
    #[arg(long)]
    pub summary_file: PathBuf,

    /// Maximum evaluate-and-revise rounds
    #[arg(long, default_value_t = 2)]
    pub iterations: u32,
}

/// Blueprint inspection subcommands
#[derive(Debug, Subcommand)]
pub enum BlueprintCommands {
    /// List built-in and user blueprints
    List,

    /// Show a blueprint's sections, inputs and rubric
    Show {
        /// Blueprint name
        name: String,
    },
}

/// Parse `key=value`; the value may itself contain `=`.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the clap command for testing and introspection
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
