//! Configuration management for draftsmith
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > env > file > defaults. TOML files carry `[defaults]`, `[generation]`,
//! `[verification]`, `[refinement]`, `[blueprints]`, `[runs]` and `[llm]`
//! sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{HOME_ENV, PROVIDER_ENV};
pub use draftsmith_utils::types::ConfigSource;
pub use model::*;
