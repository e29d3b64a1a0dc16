//! Durable baseline storage.
//!
//! The baseline is one JSON document: the last successfully fetched snapshot
//! serialized as an array of records. It is overwritten wholesale on every
//! successful fetch, never appended to or versioned. A missing file is the
//! valid first-run state, not an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Snapshot;

const BASELINE_FILE: &str = "baseline.json";
const TMP_FILE: &str = ".baseline.json.tmp";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Baseline document is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

/// Loads and persists the baseline snapshot for one account.
///
/// Owned by a single process; no concurrent writer is assumed. `save` writes
/// a temporary file next to the target and renames it into place, so the
/// baseline either fully changes or stays untouched.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted at `<state_dir>/profiles/<account>/baseline.json`.
    /// The state dir may start with `~`; the account is sanitized for use as
    /// a directory name.
    pub fn for_account(state_dir: &str, account: &str) -> Self {
        let expanded = shellexpand::tilde(state_dir);
        let path = Path::new(expanded.as_ref())
            .join("profiles")
            .join(sanitize_account(account))
            .join(BASELINE_FILE);
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last persisted snapshot, or the empty snapshot if none exists yet.
    /// An unreadable or unparsable document is an error; the file is left
    /// alone for inspection.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::empty());
        }
        let contents = fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&contents)?;
        Ok(snapshot)
    }

    /// Replace the baseline with `snapshot`. Parent directories are created
    /// on demand.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(self.path.display().to_string()))?;
        fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = parent.join(TMP_FILE);
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Keep letters, digits, dot, underscore and dash; anything else becomes an
/// underscore. Account names come from user input and end up as directory
/// names.
fn sanitize_account(account: &str) -> String {
    account
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
