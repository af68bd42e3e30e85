use anyhow::Result;
use std::path::{Path, PathBuf};

const NOTEWISE_DIR: &str = ".notewise";
const SESSIONS_DIR: &str = "ai_sessions";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable to override the Notewise directory.
pub const NOTEWISE_DIR_ENV: &str = "NOTEWISE_DIR";

/// Resolve the Notewise data directory.
/// Priority: NOTEWISE_DIR env var > ~/.notewise/
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(NOTEWISE_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(NOTEWISE_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Session logs directory: <data_dir>/ai_sessions/
pub fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSIONS_DIR)
}

/// Config file inside the data directory: <data_dir>/config.toml
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}
