use std::path::PathBuf;

use anyhow::{Context, Result};
use notewise_memory::{NotewiseConfig, SessionCleanup};
use serde_json::json;

use crate::output::{OutputFormat, json::print_json};

pub fn run(
    config: &NotewiseConfig,
    notes_root: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let notes_root = match notes_root {
        Some(root) => root,
        None => config.require_notes_root()?.to_path_buf(),
    };

    let cleanup = SessionCleanup::new(config.sessions_dir.clone(), Some(notes_root.clone()));
    let removed = cleanup
        .cleanup_orphaned_sessions()
        .with_context(|| format!("Cleanup against {} failed", notes_root.display()))?;

    if format.is_json() {
        return print_json(&json!({ "removed": removed }));
    }
    println!("Removed {removed} orphaned session(s)");
    Ok(())
}
