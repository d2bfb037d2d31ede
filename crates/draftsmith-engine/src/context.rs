//! Background context aggregation
//!
//! Notes, prior documents and uploaded-file summaries are folded into one
//! bounded markdown blob. Stages treat the blob as opaque text and cut it
//! again with [`truncate_for_prompt`] before embedding it in a prompt.

use anyhow::{Context, Result};
use draftsmith_utils::text::{estimate_tokens, truncate_chars, truncate_with_marker};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const TRUNCATION_MARKER: &str = "\n[...context truncated]";

/// Cut context to `budget` characters for embedding in one prompt.
#[must_use]
pub fn truncate_for_prompt(text: &str, budget: usize) -> &str {
    truncate_chars(text.trim(), budget)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextItem {
    Note { title: String, body: String },
    PriorDocument { title: String, content: String },
    FileSummary { filename: String, summary: String },
}

/// The aggregated context blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedContext {
    pub full_context_text: String,
    pub token_estimate: usize,
}

impl AggregatedContext {
    /// Wrap free text, e.g. a `--context-file`, without grouping.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let full_context_text = text.into();
        let token_estimate = estimate_tokens(&full_context_text);
        Self {
            full_context_text,
            token_estimate,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_context_text.trim().is_empty()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.full_context_text
    }
}

#[derive(Debug, Clone)]
pub struct ContextAggregator {
    max_chars: usize,
    items: Vec<ContextItem>,
}

impl ContextAggregator {
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn push(mut self, item: ContextItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn add(&mut self, item: ContextItem) {
        self.items.push(item);
    }

    /// Group items under `## Notes`, `## Prior Documents` and
    /// `## Uploaded Files`, in that order, and bound the result.
    #[must_use]
    pub fn build(&self) -> AggregatedContext {
        let mut notes = Vec::new();
        let mut documents = Vec::new();
        let mut files = Vec::new();

        for item in &self.items {
            match item {
                ContextItem::Note { title, body } => {
                    notes.push(format!("### {}\n{}", title.trim(), body.trim()));
                }
                ContextItem::PriorDocument { title, content } => {
                    documents.push(format!("### {}\n{}", title.trim(), content.trim()));
                }
                ContextItem::FileSummary { filename, summary } => {
                    files.push(format!("### {}\n{}", filename.trim(), summary.trim()));
                }
            }
        }

        let mut blocks = Vec::new();
        for (heading, entries) in [
            ("## Notes", notes),
            ("## Prior Documents", documents),
            ("## Uploaded Files", files),
        ] {
            if !entries.is_empty() {
                blocks.push(format!("{heading}\n\n{}", entries.join("\n\n")));
            }
        }

        let joined = blocks.join("\n\n");
        let full_context_text = truncate_with_marker(&joined, self.max_chars, TRUNCATION_MARKER);
        let token_estimate = estimate_tokens(&full_context_text);
        debug!(
            items = self.items.len(),
            chars = full_context_text.chars().count(),
            token_estimate,
            "Aggregated context"
        );

        AggregatedContext {
            full_context_text,
            token_estimate,
        }
    }
}

/// Source of project context.
pub trait ContextProvider {
    /// Build the aggregated context for one project.
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O failures.
    fn build(&self, project_id: &str) -> Result<AggregatedContext>;
}

/// Reads context from `<root>/<project_id>/`:
/// `notes/*.md|*.txt`, `documents/*.md` and `files/*.summary.md`.
#[derive(Debug, Clone)]
pub struct DirectoryContextProvider {
    root: PathBuf,
    max_chars: usize,
}

impl DirectoryContextProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, max_chars: usize) -> Self {
        Self {
            root: root.into(),
            max_chars,
        }
    }
}

impl ContextProvider for DirectoryContextProvider {
    fn build(&self, project_id: &str) -> Result<AggregatedContext> {
        let project = self.root.join(project_id);
        if !project.is_dir() {
            anyhow::bail!("Project directory not found: {}", project.display());
        }

        let mut aggregator = ContextAggregator::new(self.max_chars);

        for (path, body) in read_dir_sorted(&project.join("notes"), &[".md", ".txt"])? {
            aggregator.add(ContextItem::Note {
                title: file_title(&path, &[".md", ".txt"]),
                body,
            });
        }
        for (path, content) in read_dir_sorted(&project.join("documents"), &[".md"])? {
            aggregator.add(ContextItem::PriorDocument {
                title: file_title(&path, &[".md"]),
                content,
            });
        }
        for (path, summary) in read_dir_sorted(&project.join("files"), &[".summary.md"])? {
            aggregator.add(ContextItem::FileSummary {
                filename: file_title(&path, &[".summary.md"]),
                summary,
            });
        }

        Ok(aggregator.build())
    }
}

fn file_title(path: &Path, suffixes: &[&str]) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    suffixes
        .iter()
        .find_map(|s| name.strip_suffix(s))
        .map(str::to_string)
        .unwrap_or(name)
}

/// Files in `dir` whose names end in one of `suffixes`, sorted by name.
/// A missing directory yields nothing.
fn read_dir_sorted(dir: &Path, suffixes: &[&str]) -> Result<Vec<(PathBuf, String)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .is_some_and(|n| suffixes.iter().any(|s| n.ends_with(s)))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|p| -> Result<(PathBuf, String)> {
            let content = std::fs::read_to_string(&p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            Ok((p, content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_groups_in_fixed_order() {
        let context = ContextAggregator::new(10_000)
            .push(ContextItem::FileSummary {
                filename: "survey.pdf".into(),
                summary: "Customers want faster onboarding.".into(),
            })
            .push(ContextItem::Note {
                title: "Kickoff".into(),
                body: "Budget approved in principle.".into(),
            })
            .push(ContextItem::PriorDocument {
                title: "2023 Plan".into(),
                content: "Phase one shipped.".into(),
            })
            .build();

        let text = context.text();
        let notes = text.find("## Notes").unwrap();
        let docs = text.find("## Prior Documents").unwrap();
        let files = text.find("## Uploaded Files").unwrap();
        assert!(notes < docs && docs < files);
        assert!(text.contains("### Kickoff\nBudget approved in principle."));
        assert_eq!(context.token_estimate, estimate_tokens(text));
    }

    #[test]
    fn test_empty_groups_are_omitted() {
        let context = ContextAggregator::new(1000)
            .push(ContextItem::Note {
                title: "n".into(),
                body: "b".into(),
            })
            .build();
        assert!(!context.text().contains("## Uploaded Files"));
        assert!(ContextAggregator::new(1000).build().is_empty());
    }

    #[test]
    fn test_bounded_to_max_chars() {
        let context = ContextAggregator::new(100)
            .push(ContextItem::Note {
                title: "long".into(),
                body: "é".repeat(500),
            })
            .build();
        assert!(context.text().chars().count() <= 100);
        assert!(context.text().ends_with("[...context truncated]"));
    }

    #[test]
    fn test_truncate_for_prompt() {
        assert_eq!(truncate_for_prompt("  abcdef  ", 3), "abc");
        assert_eq!(truncate_for_prompt("ab", 3000), "ab");
    }

    #[test]
    fn test_directory_provider() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("atlas");
        std::fs::create_dir_all(project.join("notes")).unwrap();
        std::fs::create_dir_all(project.join("files")).unwrap();
        std::fs::write(project.join("notes/b-call.md"), "Second note").unwrap();
        std::fs::write(project.join("notes/a-kickoff.txt"), "First note").unwrap();
        std::fs::write(project.join("notes/ignored.json"), "{}").unwrap();
        std::fs::write(project.join("files/deck.pdf.summary.md"), "Deck summary").unwrap();

        let provider = DirectoryContextProvider::new(root.path(), 3000);
        let context = provider.build("atlas").unwrap();
        let text = context.text();

        assert!(text.find("First note").unwrap() < text.find("Second note").unwrap());
        assert!(text.contains("### deck.pdf\nDeck summary"));
        assert!(!text.contains("{}"));
        assert!(!text.contains("## Prior Documents"));

        assert!(provider.build("missing").is_err());
    }
}
