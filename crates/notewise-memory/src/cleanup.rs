//! Removal of sessions whose note no longer exists.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{MemoryError, Result};
use crate::store::SESSION_FILE_EXT;

/// Housekeeping for the sessions directory.
///
/// Runs outside the history write path; it only ever deletes whole
/// session files.
#[derive(Debug, Clone)]
pub struct SessionCleanup {
    sessions_dir: PathBuf,
    notes_root: Option<PathBuf>,
}

impl SessionCleanup {
    pub fn new(sessions_dir: impl Into<PathBuf>, notes_root: Option<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            notes_root,
        }
    }

    /// Delete every session file whose id matches no file under the notes
    /// root. Returns how many were deleted.
    pub fn cleanup_orphaned_sessions(&self) -> Result<usize> {
        if !self.sessions_dir.exists() {
            info!(
                sessions_dir = %self.sessions_dir.display(),
                "No sessions directory, nothing to clean"
            );
            return Ok(0);
        }
        let Some(notes_root) = &self.notes_root else {
            warn!("Notes root not configured, skipping orphan cleanup");
            return Ok(0);
        };

        let note_names = collect_file_names(notes_root)?;
        let entries = fs::read_dir(&self.sessions_dir)
            .map_err(|err| MemoryError::storage(&self.sessions_dir, err))?;

        let mut cleaned = 0;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_FILE_EXT)
            {
                continue;
            }
            let Some(session_id) = path.file_stem().map(|stem| stem.to_os_string()) else {
                continue;
            };
            if note_names.contains(&session_id) {
                continue;
            }

            info!(session_id = %session_id.to_string_lossy(), "Removing orphaned session");
            match fs::remove_file(&path) {
                Ok(()) => cleaned += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(MemoryError::storage(&path, err)),
            }
        }

        info!(cleaned, "Orphan session cleanup finished");
        Ok(cleaned)
    }
}

fn collect_file_names(root: &Path) -> Result<HashSet<OsString>> {
    // An unreachable notes root would make every session look orphaned.
    if !root.is_dir() {
        return Err(MemoryError::storage(
            root,
            std::io::Error::new(ErrorKind::NotFound, "notes root is not a directory"),
        ));
    }

    let mut names = HashSet::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry under notes root");
                continue;
            }
        };
        if entry.file_type().is_file() {
            names.insert(entry.file_name().to_os_string());
        }
    }
    Ok(names)
}
