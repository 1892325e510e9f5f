use crate::error::RagError;
use crate::models::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const HISTORY_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct HistoryFileOut<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    turns: &'a [Turn],
}

#[derive(Deserialize)]
struct HistoryFileIn {
    version: u32,
    turns: Vec<Turn>,
}

/// Ordered conversation log backed by a single JSON file.
///
/// Mutations only touch memory; callers decide when to `save`. The one
/// exception is `clear`, which persists the empty state immediately.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    turns: Vec<Turn>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            turns: Vec::new(),
        }
    }

    /// Loads `path` if it exists. A missing or unreadable file yields an
    /// empty history.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        match store.load() {
            Ok(0) => {}
            Ok(count) => info!(path = %store.path.display(), turns = count, "loaded chat history"),
            Err(error) => warn!(%error, "starting with an empty history"),
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Replaces the in-memory turns with the file contents and returns how
    /// many were read. On error the history is left empty.
    pub fn load(&mut self) -> Result<usize, RagError> {
        self.turns.clear();

        if !self.path.exists() {
            return Ok(0);
        }

        let load_error = |details: String| RagError::HistoryLoadError {
            path: self.path.clone(),
            details,
        };

        let raw = fs::read_to_string(&self.path).map_err(|error| load_error(error.to_string()))?;
        let file: HistoryFileIn =
            serde_json::from_str(&raw).map_err(|error| load_error(error.to_string()))?;

        if file.version > HISTORY_SCHEMA_VERSION {
            return Err(load_error(format!(
                "schema version {} is newer than supported {}",
                file.version, HISTORY_SCHEMA_VERSION
            )));
        }

        self.turns = file.turns;
        Ok(self.turns.len())
    }

    /// Writes the full history to a sibling temp file and renames it over
    /// the target.
    pub fn save(&self) -> Result<(), RagError> {
        let save_error = |details: String| RagError::HistorySaveError {
            path: self.path.clone(),
            details,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| save_error(error.to_string()))?;
        }

        let payload = HistoryFileOut {
            version: HISTORY_SCHEMA_VERSION,
            saved_at: Utc::now(),
            turns: &self.turns,
        };
        let json =
            serde_json::to_string_pretty(&payload).map_err(|error| save_error(error.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(|error| save_error(error.to_string()))?;
        if let Err(error) = fs::rename(&tmp_path, &self.path) {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %cleanup, "could not remove temp history file");
            }
            return Err(save_error(error.to_string()));
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), RagError> {
        self.turns.clear();
        self.save()
    }
}
