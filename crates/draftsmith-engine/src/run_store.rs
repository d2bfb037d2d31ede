//! Run record persistence

use camino::{Utf8Path, Utf8PathBuf};
use draftsmith_utils::atomic_write::{read_file_with_crlf_tolerance, write_file_atomic};
use draftsmith_utils::error::DraftError;
use tracing::{debug, warn};

use crate::run_state::GenerationRunState;

/// Storage for run records. The pipeline only needs these three operations.
pub trait RunStore: Send + Sync {
    /// Persist `state`, replacing any earlier record with the same id.
    ///
    /// # Errors
    ///
    /// `DraftError::Store` when the record cannot be written.
    fn save(&self, state: &GenerationRunState) -> Result<(), DraftError>;

    /// # Errors
    ///
    /// `DraftError::Store` when the record is missing or unreadable.
    fn load(&self, run_id: &str) -> Result<GenerationRunState, DraftError>;

    /// Stored run ids, oldest first.
    ///
    /// # Errors
    ///
    /// `DraftError::Store` when the store cannot be listed.
    fn list(&self) -> Result<Vec<String>, DraftError>;
}

/// One pretty-printed JSON file per run: `<dir>/<run_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    dir: Utf8PathBuf,
}

impl JsonRunStore {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> Result<Utf8PathBuf, DraftError> {
        if run_id.is_empty()
            || run_id.contains(['/', '\\'])
            || run_id.starts_with('.')
        {
            return Err(DraftError::Store {
                path: self.dir.clone().into_std_path_buf(),
                reason: format!("invalid run id '{run_id}'"),
            });
        }
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

fn store_error(path: &Utf8Path, reason: impl std::fmt::Display) -> DraftError {
    DraftError::Store {
        path: path.as_std_path().to_path_buf(),
        reason: reason.to_string(),
    }
}

impl RunStore for JsonRunStore {
    fn save(&self, state: &GenerationRunState) -> Result<(), DraftError> {
        let path = self.path_for(&state.run_id)?;
        let json = serde_json::to_string_pretty(state).map_err(|e| store_error(&path, e))?;
        let result = write_file_atomic(&path, &json).map_err(|e| store_error(&path, format!("{e:#}")))?;
        for warning in &result.warnings {
            warn!(path = %path, warning = %warning, "Run record write warning");
        }
        debug!(path = %path, status = %state.status, bytes = result.bytes_written, "Saved run record");
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<GenerationRunState, DraftError> {
        let path = self.path_for(run_id)?;
        if !path.is_file() {
            return Err(store_error(&path, format!("run '{run_id}' not found")));
        }
        let content =
            read_file_with_crlf_tolerance(&path).map_err(|e| store_error(&path, format!("{e:#}")))?;
        serde_json::from_str(&content).map_err(|e| store_error(&path, e))
    }

    fn list(&self) -> Result<Vec<String>, DraftError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = self.dir.read_dir_utf8().map_err(|e| store_error(&self.dir, e))?;
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension() == Some("json"))
            .filter_map(|entry| entry.path().file_stem().map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_state::RunStatus;
    use draftsmith_blueprint::UserInputs;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> JsonRunStore {
        JsonRunStore::new(Utf8PathBuf::from_path_buf(temp.path().join("runs")).unwrap())
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let inputs: UserInputs = [("goal", "Ship Atlas")].into_iter().collect();
        let mut state = GenerationRunState::new("project-charter", inputs);
        state.initial_draft = Some("# Overview\n\nBody".into());
        state.complete();

        store.save(&state).unwrap();
        let loaded = store.load(&state.run_id).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(store.list().unwrap(), vec![state.run_id.clone()]);
    }

    #[test]
    fn test_save_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut state = GenerationRunState::new("memo", UserInputs::new());
        store.save(&state).unwrap();
        state.fail("quota");
        store.save(&state).unwrap();

        assert_eq!(store.load(&state.run_id).unwrap().status, RunStatus::Failed);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.load("nope"), Err(DraftError::Store { .. })));
        assert!(matches!(store.load("../etc/passwd"), Err(DraftError::Store { .. })));
    }
}
