//! Blueprint store
//!
//! Resolves blueprint names against an optional directory first and the
//! built-in set second, validates on first load and caches the result by
//! name for the lifetime of the store.

use draftsmith_utils::error::BlueprintError;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::model::Blueprint;
use crate::prompt_config::PromptConfig;

pub const BLUEPRINT_PROJECT_CHARTER: &str = "project-charter";
pub const BLUEPRINT_BUSINESS_PROPOSAL: &str = "business-proposal";
pub const BLUEPRINT_MARKET_ANALYSIS: &str = "market-analysis";

/// All built-in blueprint names
pub const BUILT_IN_BLUEPRINTS: &[&str] = &[
    BLUEPRINT_BUSINESS_PROPOSAL,
    BLUEPRINT_MARKET_ANALYSIS,
    BLUEPRINT_PROJECT_CHARTER,
];

fn builtin_source(name: &str) -> Option<&'static str> {
    match name {
        BLUEPRINT_PROJECT_CHARTER => Some(include_str!("../builtin/project-charter.yaml")),
        BLUEPRINT_BUSINESS_PROPOSAL => Some(include_str!("../builtin/business-proposal.yaml")),
        BLUEPRINT_MARKET_ANALYSIS => Some(include_str!("../builtin/market-analysis.yaml")),
        _ => None,
    }
}

const BLUEPRINT_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Default)]
pub struct BlueprintStore {
    dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, Arc<Blueprint>>>,
}

impl BlueprintStore {
    /// Store that looks in `dir` before the built-ins.
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn builtin_only() -> Self {
        Self::new(None)
    }

    /// Load a blueprint by name.
    ///
    /// # Errors
    ///
    /// `NotFound` (with every valid name) for an unknown name, `Parse`/`Io`
    /// for unreadable files and `Invalid`/`DuplicateSectionId` when
    /// validation fails.
    pub fn load(&self, name: &str) -> Result<Arc<Blueprint>, BlueprintError> {
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            debug!(blueprint = name, "Blueprint cache hit");
            return Ok(Arc::clone(cached));
        }

        let blueprint = self.resolve(name)?;
        blueprint.validate()?;
        debug!(
            blueprint = name,
            sections = blueprint.sections.len(),
            "Loaded blueprint"
        );

        let blueprint = Arc::new(blueprint);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&blueprint));
        Ok(blueprint)
    }

    /// Validate and cache a blueprint built in code.
    ///
    /// # Errors
    ///
    /// Any validation error.
    pub fn insert(&self, blueprint: Blueprint) -> Result<Arc<Blueprint>, BlueprintError> {
        blueprint.validate()?;
        let blueprint = Arc::new(blueprint);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(blueprint.name.clone(), Arc::clone(&blueprint));
        Ok(blueprint)
    }

    /// Sorted names of every loadable blueprint.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            BUILT_IN_BLUEPRINTS.iter().map(|s| (*s).to_string()).collect();
        names.extend(
            self.cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned(),
        );
        if let Some(dir) = &self.dir {
            names.extend(directory_names(dir));
        }
        names.into_iter().collect()
    }

    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        BUILT_IN_BLUEPRINTS.contains(&name)
    }

    fn resolve(&self, name: &str) -> Result<Blueprint, BlueprintError> {
        if let Some(dir) = &self.dir
            && let Some(path) = find_blueprint_file(dir, name)
        {
            return load_from_path(&path);
        }

        if let Some(source) = builtin_source(name) {
            let label = format!("<built-in {name}>");
            return parse_blueprint(source, &label, false);
        }

        Err(BlueprintError::NotFound {
            name: name.to_string(),
            available: self.list(),
        })
    }
}

/// Load a blueprint file plus its companion `<stem>.prompt.yaml`, if any.
///
/// # Errors
///
/// `Io` when the file cannot be read, `Parse` when it is not a blueprint.
pub fn load_from_path(path: &Path) -> Result<Blueprint, BlueprintError> {
    let label = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| BlueprintError::Io {
        path: label.clone(),
        source,
    })?;
    let is_json = path.extension().is_some_and(|e| e == "json");
    let mut blueprint = parse_blueprint(&content, &label, is_json)?;

    if let Some(companion) = companion_prompt_path(path) {
        let companion_label = companion.display().to_string();
        let content =
            std::fs::read_to_string(&companion).map_err(|source| BlueprintError::Io {
                path: companion_label.clone(),
                source,
            })?;
        blueprint.prompt_config = serde_yaml::from_str::<PromptConfig>(&content).map_err(|e| {
            BlueprintError::Parse {
                path: companion_label,
                reason: e.to_string(),
            }
        })?;
        debug!(path = %companion.display(), "Applied companion prompt configuration");
    }

    Ok(blueprint)
}

fn parse_blueprint(content: &str, label: &str, is_json: bool) -> Result<Blueprint, BlueprintError> {
    let parsed = if is_json {
        serde_json::from_str::<Blueprint>(content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<Blueprint>(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| BlueprintError::Parse {
        path: label.to_string(),
        reason,
    })
}

fn is_prompt_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(".prompt"))
}

fn find_blueprint_file(dir: &Path, name: &str) -> Option<PathBuf> {
    BLUEPRINT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|p| p.is_file())
}

fn companion_prompt_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let dir = path.parent()?;
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{stem}.prompt.{ext}")))
        .find(|p| p.is_file())
}

fn directory_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && !is_prompt_file(p))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| BLUEPRINT_EXTENSIONS.contains(&e))
        })
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect()
}
