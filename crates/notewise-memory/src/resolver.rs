//! Maps a request to the session that carries its conversation.

use crate::error::{MemoryError, Result};
use crate::prompt::{TaskKind, TaskParams};
use crate::store::validate_session_id;

/// Parameter whose base name identifies the session.
pub const SESSION_PARAM: &str = "filename";

/// Stateless session-id resolution.
///
/// Memory-bearing tasks key their session by the base name of the document
/// they work on, so the same note keeps one conversation wherever its path
/// was given from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionResolver;

impl SessionResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, task_type: &str, params: &TaskParams) -> Result<String> {
        let kind: TaskKind = task_type.parse()?;
        self.resolve_kind(kind, params)
    }

    pub fn resolve_kind(&self, kind: TaskKind, params: &TaskParams) -> Result<String> {
        if !kind.has_memory() {
            return Err(MemoryError::UnsupportedTask(format!(
                "{kind} has no conversation history"
            )));
        }
        let filename = params
            .get(SESSION_PARAM)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MemoryError::MissingParameter(SESSION_PARAM.to_string()))?;

        let session_id = base_name(filename);
        validate_session_id(session_id)?;
        Ok(session_id.to_string())
    }
}

/// Last path component, accepting both `/` and `\` as separators.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
