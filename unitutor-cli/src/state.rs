use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::catalog::ProgramLevel;

/// The user's current place in the selection flow, persisted across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub level: Option<ProgramLevel>,
    pub faculty_id: Option<String>,
    pub course_id: Option<String>,
}

impl SelectionState {
    /// A chat can start only once every step of the flow has been chosen.
    pub fn is_complete(&self) -> bool {
        self.level.is_some() && self.faculty_id.is_some() && self.course_id.is_some()
    }
}

/// Explicit load/save boundary around the persisted selection state,
/// instead of ambient storage access scattered through the UI.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data dir {:?}", data_dir))?;
        }
        Ok(Self {
            path: data_dir.join("selection.json"),
        })
    }

    /// A missing or corrupt file yields the empty state.
    pub fn load(&self) -> SelectionState {
        if !self.path.exists() {
            return SelectionState::default();
        }
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("discarding corrupt selection state: {}", err);
                SelectionState::default()
            }),
            Err(err) => {
                warn!("failed to read selection state: {}", err);
                SelectionState::default()
            }
        }
    }

    pub fn save(&self, state: &SelectionState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).context("writing selection state")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("clearing selection state")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        assert_eq!(store.load(), SelectionState::default());
    }

    #[test]
    fn save_load_clear_round_trip() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        let state = SelectionState {
            level: Some(ProgramLevel::Degree),
            faculty_id: Some("engineering".to_string()),
            course_id: Some("eng-elec-deg".to_string()),
        };
        assert!(state.is_complete());

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);

        store.clear().unwrap();
        assert_eq!(store.load(), SelectionState::default());
    }

    #[test]
    fn corrupt_file_loads_empty_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("selection.json"), "{nope").unwrap();
        assert_eq!(store.load(), SelectionState::default());
    }

    #[test]
    fn partial_selection_is_not_complete() {
        let state = SelectionState {
            level: Some(ProgramLevel::Diploma),
            faculty_id: None,
            course_id: None,
        };
        assert!(!state.is_complete());
    }
}
