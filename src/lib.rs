//! draftsmith - blueprint-driven business document generation
//!
//! A blueprint names the sections of a document, the inputs a user supplies
//! and the rubric the result is scored against. draftsmith outlines the
//! document in one call, drafts every section separately with word-count and
//! invented-name checks, assembles the markdown, and optionally scores and
//! refines it.
//!
//! draftsmith can be used in two ways:
//! - **CLI**: run `draftsmith generate --blueprint business-proposal ...`
//! - **Library**: build a [`DocumentPipeline`] and call its async operations
//!
//! # Quick Start (Library)
//!
//! ```no_run
//! use draftsmith::{Config, DocumentPipeline, UserInputs};
//!
//! # async fn demo() -> Result<(), draftsmith::DraftError> {
//! let config = Config::builder().build()?;
//! let (pipeline, _fallback) = DocumentPipeline::from_config(&config)?;
//! let inputs: UserInputs = [("company_name", "Acme")].into_iter().collect();
//! let outcome = pipeline
//!     .generate_document("business-proposal", &inputs, "")
//!     .await?;
//! println!("{}", outcome.value().content);
//! # Ok(())
//! # }
//! ```
//!
//! # JSON Contracts
//!
//! CLI JSON output is emitted in JCS (RFC 8785) canonical form. Use
//! [`emit_jcs`] for the same form in your own integrations.

use anyhow::{Context, Result};
use serde::Serialize;

pub use draftsmith_blueprint as blueprint;
pub use draftsmith_config as config;
pub use draftsmith_engine as engine;
pub use draftsmith_extraction as extraction;
pub use draftsmith_llm as llm;
pub use draftsmith_utils as utils;

/// Blueprint model, store and user inputs.
pub use draftsmith_blueprint::{Blueprint, BlueprintStore, UserInputs};

/// Configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
pub use draftsmith_config::{CliArgs, Config, ConfigBuilder};

/// The pipeline facade and the values its operations return.
pub use draftsmith_engine::{
    DocumentPipeline, DraftResult, GenerationRunState, Outcome, RunStatus, Usage,
    VerificationResult,
};

/// Library error type.
pub use draftsmith_utils::error::DraftError;

/// CLI exit codes.
pub use draftsmith_utils::exit_codes::ExitCode;

/// Trait for providing user-friendly error reporting.
pub use draftsmith_utils::error::UserFriendlyError;

#[doc(hidden)]
pub mod cli;

/// Emit a value as canonical JSON (JCS, RFC 8785).
///
/// # Errors
///
/// Returns an error when the value cannot be serialized.
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// Returns the draftsmith version
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
