//! Runtime configuration.
//!
//! Looked up in order: `$NOTEWISE_CONFIG`, `./notewise.toml`,
//! `<data_dir>/config.toml`. Without a file, settings come from the
//! environment over built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use notewise_ai::LlmSettings;
use serde::Deserialize;

use crate::error::{MemoryError, Result};
use crate::paths;
use crate::rollup::{DEFAULT_MAX_ROUNDS, DEFAULT_TRIM_ROUNDS, RollupPolicy};

pub const CONFIG_ENV: &str = "NOTEWISE_CONFIG";
const LOCAL_CONFIG_FILE: &str = "notewise.toml";
const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";

/// History budget settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_trim_rounds")]
    pub trim_rounds: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            trim_rounds: default_trim_rounds(),
        }
    }
}

impl HistorySettings {
    pub fn to_policy(&self) -> Result<RollupPolicy> {
        RollupPolicy::new(self.max_rounds, self.trim_rounds)
    }
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_trim_rounds() -> usize {
    DEFAULT_TRIM_ROUNDS
}

#[derive(Debug, Clone)]
pub struct NotewiseConfig {
    pub data_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub notes_root: Option<PathBuf>,
    pub history: HistorySettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    history: HistorySettings,
    #[serde(default)]
    llm: LlmSettings,
}

#[derive(Debug, Deserialize, Default)]
struct PathsSection {
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    sessions_dir: Option<PathBuf>,
    #[serde(default)]
    notes_root: Option<PathBuf>,
}

impl NotewiseConfig {
    /// Discover and load the configuration.
    pub fn load() -> anyhow::Result<Self> {
        let data_dir = paths::resolve_data_dir()?;
        match find_config_file(&data_dir) {
            Some(path) => Self::load_from(&path),
            None => Self::from_env(data_dir),
        }
    }

    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let file: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        let data_dir = match file.paths.data_dir {
            Some(dir) => dir,
            None => paths::resolve_data_dir()?,
        };
        let mut llm = file.llm;
        if llm.api_key.is_none() {
            llm.api_key = env::var(API_KEY_ENV).ok();
        }

        let config = Self {
            sessions_dir: file
                .paths
                .sessions_dir
                .unwrap_or_else(|| paths::sessions_dir(&data_dir)),
            notes_root: file.paths.notes_root,
            history: file.history,
            llm,
            data_dir,
        };
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Settings from environment variables over defaults.
    pub fn from_env(data_dir: PathBuf) -> anyhow::Result<Self> {
        let defaults = HistorySettings::default();
        let history = HistorySettings {
            max_rounds: env_count("NOTEWISE_MAX_ROUNDS")?.unwrap_or(defaults.max_rounds),
            trim_rounds: env_count("NOTEWISE_TRIM_ROUNDS")?.unwrap_or(defaults.trim_rounds),
        };

        let mut llm = LlmSettings {
            api_key: env::var(API_KEY_ENV).ok(),
            ..LlmSettings::default()
        };
        if let Ok(model) = env::var("NOTEWISE_MODEL") {
            llm.model = model;
        }
        if let Ok(base_url) = env::var("NOTEWISE_BASE_URL") {
            llm.base_url = base_url;
        }

        let config = Self {
            sessions_dir: paths::sessions_dir(&data_dir),
            notes_root: env::var("NOTEWISE_NOTES_ROOT").ok().map(PathBuf::from),
            history,
            llm,
            data_dir,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.history.to_policy().map(|_| ())
    }

    pub fn rollup_policy(&self) -> Result<RollupPolicy> {
        self.history.to_policy()
    }

    pub fn require_notes_root(&self) -> Result<&Path> {
        self.notes_root
            .as_deref()
            .ok_or_else(|| MemoryError::Config("notes_root is not configured".to_string()))
    }
}

fn find_config_file(data_dir: &Path) -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let in_data_dir = paths::config_path(data_dir);
    in_data_dir.exists().then_some(in_data_dir)
}

/// Round count from `key`. Unset is `None`; an unparsable value is an error.
fn env_count(key: &str) -> anyhow::Result<Option<usize>> {
    match env::var(key) {
        Ok(value) => parse_count(key, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_count(key: &str, value: &str) -> anyhow::Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notewise.toml");
        fs::write(
            &path,
            format!(
                "[paths]\ndata_dir = {:?}\nnotes_root = \"/vault\"\n\n\
                 [llm]\napi_key = \"sk-file\"\n",
                dir.path().display().to_string()
            ),
        )
        .unwrap();

        let config = NotewiseConfig::load_from(&path).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.sessions_dir, dir.path().join("ai_sessions"));
        assert_eq!(config.notes_root.as_deref(), Some(Path::new("/vault")));
        assert_eq!(config.history, HistorySettings::default());
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.llm.model, "qwen3-max");
    }

    #[test]
    fn invalid_budget_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notewise.toml");
        fs::write(
            &path,
            format!(
                "[paths]\ndata_dir = {:?}\n\n[history]\nmax_rounds = 4\ntrim_rounds = 5\n",
                dir.path().display().to_string()
            ),
        )
        .unwrap();

        let err = NotewiseConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("trim_rounds"));
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[history\nmax_rounds = ").unwrap();

        let err = NotewiseConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn require_notes_root_reports_missing_value() {
        let config = NotewiseConfig {
            data_dir: PathBuf::from("/tmp/nw"),
            sessions_dir: PathBuf::from("/tmp/nw/ai_sessions"),
            notes_root: None,
            history: HistorySettings::default(),
            llm: LlmSettings::default(),
        };
        assert!(matches!(
            config.require_notes_root(),
            Err(MemoryError::Config(_))
        ));
    }

    #[test]
    fn env_count_values_are_trimmed() {
        assert_eq!(parse_count("NOTEWISE_MAX_ROUNDS", " 12 ").unwrap(), 12);
    }

    #[test]
    fn bad_env_count_names_the_variable() {
        let err = parse_count("NOTEWISE_TRIM_ROUNDS", "abc").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NOTEWISE_TRIM_ROUNDS"));
        assert!(message.contains("\"abc\""));
    }
}
