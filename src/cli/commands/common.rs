//! Common helper functions used across CLI commands
//!
//! Pipeline construction, input and context loading, and output writing.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use draftsmith_blueprint::BlueprintStore;
use draftsmith_engine::{
    ContextAggregator, ContextItem, ContextProvider, DirectoryContextProvider, JsonRunStore,
    PipelineSettings,
};
use draftsmith_llm::CompletionClient;
use draftsmith_utils::atomic_write::{read_file_with_crlf_tolerance, write_file_atomic};
use draftsmith_utils::text::truncate_chars;

use crate::{Config, DocumentPipeline, UserInputs};

/// Build a pipeline from configuration.
///
/// `model_override` is the `--model` flag; it replaces whatever model the
/// provider section resolved.
pub fn build_pipeline(
    config: &Config,
    model_override: Option<&str>,
    settings: PipelineSettings,
) -> Result<DocumentPipeline> {
    let (mut client, fallback) =
        CompletionClient::from_config(config).map_err(crate::DraftError::from)?;
    if let Some(info) = fallback {
        warn!(
            primary = %info.primary_provider,
            fallback = %info.fallback_provider,
            reason = %info.reason,
            "Primary LLM provider unavailable; using fallback"
        );
    }
    if let Some(model) = model_override {
        client = client.with_model(model);
    }

    let blueprints = Arc::new(BlueprintStore::new(Some(config.blueprints_dir())));
    let mut pipeline = DocumentPipeline::new(client, blueprints, settings);

    match camino::Utf8PathBuf::from_path_buf(config.runs_dir()) {
        Ok(dir) => pipeline = pipeline.with_run_store(Arc::new(JsonRunStore::new(dir))),
        Err(dir) => warn!(
            path = %dir.display(),
            "Runs directory is not valid UTF-8; run records will not be saved"
        ),
    }
    Ok(pipeline)
}

/// Read a UTF-8 text file, normalizing CRLF line endings.
pub fn read_text(path: &Path) -> Result<String> {
    let utf8 = Utf8Path::from_path(path)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;
    read_file_with_crlf_tolerance(utf8).with_context(|| format!("Failed to read {utf8}"))
}

/// Read and deserialize a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Merge `--inputs-file` with `--input` pairs; the pairs win.
///
/// Non-string JSON values are kept in their JSON text form.
pub fn load_inputs(pairs: &[(String, String)], inputs_file: Option<&Path>) -> Result<UserInputs> {
    let mut inputs = UserInputs::new();

    if let Some(path) = inputs_file {
        let object: serde_json::Map<String, serde_json::Value> = read_json(path)
            .with_context(|| format!("{} must hold a JSON object", path.display()))?;
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            inputs.insert(key, value);
        }
    }

    for (key, value) in pairs {
        inputs.insert(key.clone(), value.clone());
    }
    Ok(inputs)
}

/// Fold project context and context files into one bounded blob.
pub fn gather_context(
    context_files: &[PathBuf],
    project: Option<(&str, &Path)>,
    budget: usize,
) -> Result<String> {
    let mut parts = Vec::new();

    if let Some((project_id, root)) = project {
        let aggregated = DirectoryContextProvider::new(root, budget).build(project_id)?;
        debug!(
            project = project_id,
            tokens = aggregated.token_estimate,
            "Loaded project context"
        );
        if !aggregated.is_empty() {
            parts.push(aggregated.full_context_text);
        }
    }

    if !context_files.is_empty() {
        let mut aggregator = ContextAggregator::new(budget);
        for path in context_files {
            let title = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            aggregator.add(ContextItem::Note {
                title,
                body: read_text(path)?,
            });
        }
        let aggregated = aggregator.build();
        if !aggregated.is_empty() {
            parts.push(aggregated.full_context_text);
        }
    }

    let joined = parts.join("\n\n");
    Ok(truncate_chars(&joined, budget).to_string())
}

/// Write `content` atomically to `output`, or print it to stdout.
pub fn write_or_print(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let utf8 = Utf8Path::from_path(path)
                .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;
            let result = write_file_atomic(utf8, content)?;
            for warning in &result.warnings {
                warn!(path = %utf8, "{warning}");
            }
            eprintln!("✓ Wrote {} bytes to {utf8}", result.bytes_written);
        }
        None => println!("{content}"),
    }
    Ok(())
}

/// Print degradation reasons to stderr.
pub fn report_degradations(reasons: &[String]) {
    if reasons.is_empty() {
        return;
    }
    eprintln!("⚠ Completed with degradations:");
    for reason in reasons {
        eprintln!("  - {reason}");
    }
}
