//! Line-oriented session log persistence.
//!
//! One `<session_id>.jsonl` file per session. Each line is a tagged record:
//!
//! ```text
//! {"type":"summary","content":"...","timestamp":"..."}
//! {"type":"message","message":{"role":"human","content":"..."},"timestamp":"..."}
//! ```
//!
//! Loading skips anything it cannot decode. Saving rewrites the whole file
//! through a temporary sibling and a rename, so readers see either the old
//! state or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MemoryError, Result};
use crate::message::{ChatMessage, MessageRole, Summary, parse_timestamp};

pub(crate) const SESSION_FILE_EXT: &str = "jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HistoryRecord {
    Summary {
        content: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Message {
        message: StoredMessage,
        #[serde(default)]
        timestamp: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredMessage {
    role: MessageRole,
    content: String,
}

/// Persisted state of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLog {
    pub summary: Option<Summary>,
    pub messages: Vec<ChatMessage>,
}

impl SessionLog {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.messages.is_empty()
    }

    pub fn round_count(&self) -> usize {
        self.messages.iter().filter(|msg| msg.is_round()).count()
    }

    /// Summary (as a leading system message) followed by resident messages.
    pub fn effective_messages(&self) -> Vec<ChatMessage> {
        let mut effective = Vec::with_capacity(self.messages.len() + 1);
        if let Some(summary) = &self.summary {
            effective.push(summary.to_system_message());
        }
        effective.extend(self.messages.iter().cloned());
        effective
    }
}

/// Reject ids that would escape the sessions directory or name nothing.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let invalid = session_id.trim().is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(MemoryError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

/// File-backed store for a single session.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    session_id: String,
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(sessions_dir: &Path, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        Ok(Self {
            session_id: session_id.to_string(),
            path: Self::session_path(sessions_dir, session_id),
        })
    }

    pub fn session_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
        sessions_dir.join(format!("{session_id}.{SESSION_FILE_EXT}"))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the session. A missing file is an empty session.
    pub fn load(&self) -> Result<SessionLog> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SessionLog::default()),
            Err(err) => return Err(MemoryError::storage(&self.path, err)),
        };

        let mut log = SessionLog::default();
        let mut skipped = 0usize;
        for (index, raw) in bytes.split(|byte| *byte == b'\n').enumerate() {
            let Ok(line) = std::str::from_utf8(raw) else {
                skipped += 1;
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(HistoryRecord::Summary { content, timestamp }) => {
                    log.summary = Some(Summary {
                        content,
                        timestamp: read_timestamp(timestamp.as_deref()),
                    });
                }
                Ok(HistoryRecord::Message { message, timestamp }) => {
                    log.messages.push(
                        ChatMessage::new(message.role, message.content)
                            .with_timestamp(read_timestamp(timestamp.as_deref())),
                    );
                }
                Err(err) => {
                    debug!(
                        session_id = %self.session_id,
                        line = index + 1,
                        error = %err,
                        "Skipping unreadable history record"
                    );
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(
                session_id = %self.session_id,
                skipped,
                "Session log contained unreadable records"
            );
        }
        Ok(log)
    }

    /// Effective history: summary marker first, then messages in order.
    pub fn read(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.load()?.effective_messages())
    }

    /// Replace the persisted state with `log`.
    pub fn save(&self, log: &SessionLog) -> Result<()> {
        let mut contents = String::new();
        if let Some(summary) = log.summary.as_ref().filter(|s| !s.content.is_empty()) {
            let record = HistoryRecord::Summary {
                content: summary.content.clone(),
                timestamp: Some(summary.timestamp.to_rfc3339()),
            };
            contents.push_str(&serde_json::to_string(&record)?);
            contents.push('\n');
        }
        for message in &log.messages {
            let record = HistoryRecord::Message {
                message: StoredMessage {
                    role: message.role,
                    content: message.content.clone(),
                },
                timestamp: Some(message.timestamp.to_rfc3339()),
            };
            contents.push_str(&serde_json::to_string(&record)?);
            contents.push('\n');
        }

        self.write_atomic(contents.as_bytes())
    }

    /// Truncate the session file to empty. The file itself is kept.
    pub fn clear(&self) -> Result<()> {
        self.ensure_parent()?;
        File::create(&self.path).map_err(|err| MemoryError::storage(&self.path, err))?;
        Ok(())
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| MemoryError::storage(parent, err))?;
        }
        Ok(())
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<()> {
        self.ensure_parent()?;
        let tmp_path = self.path.with_extension(format!("{SESSION_FILE_EXT}.tmp"));

        let write_tmp = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(contents)?;
            file.sync_all()
        };
        if let Err(err) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(MemoryError::storage(&tmp_path, err));
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(MemoryError::storage(&self.path, err));
        }
        Ok(())
    }
}

fn read_timestamp(value: Option<&str>) -> chrono::DateTime<Utc> {
    value.and_then(parse_timestamp).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileHistoryStore {
        FileHistoryStore::new(dir.path(), "doc.md").unwrap()
    }

    fn contents(log: &SessionLog) -> Vec<(MessageRole, String)> {
        log.messages
            .iter()
            .map(|msg| (msg.role, msg.content.clone()))
            .collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let log = store(&dir).load().unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_summary() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let log = SessionLog {
            summary: Some(Summary::new("earlier talk")),
            messages: vec![
                ChatMessage::user("q1"),
                ChatMessage::assistant("a1"),
                ChatMessage::user("q2"),
                ChatMessage::assistant("a2"),
            ],
        };
        store.save(&log).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.summary.as_ref().unwrap().content, "earlier talk");
        assert_eq!(contents(&loaded), contents(&log));
        assert_eq!(
            loaded.messages[0].timestamp.timestamp(),
            log.messages[0].timestamp.timestamp()
        );
        assert!(!dir.path().join("doc.md.jsonl.tmp").exists());
    }

    #[test]
    fn load_skips_malformed_lines_and_keeps_last_summary() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let raw = [
            r#"{"type":"summary","content":"old","timestamp":"2025-01-01T00:00:00"}"#,
            "",
            "not json at all",
            r#"{"type":"message","message":{"role":"human","content":"hello"},"timestamp":"2025-01-01T00:00:01"}"#,
            r#"{"type":"message","message":{"role":"tool","content":"bad role"}}"#,
            r#"{"type":"checkpoint","id":"x"}"#,
            r#"{"type":"summary","content":"newer"}"#,
            r#"{"type":"message","message":{"role":"ai","content":"hi there"}}"#,
        ]
        .join("\n");
        fs::write(store.path(), raw).unwrap();

        let log = store.load().unwrap();
        assert_eq!(log.summary.unwrap().content, "newer");
        assert_eq!(
            contents(&SessionLog {
                summary: None,
                messages: log.messages,
            }),
            vec![
                (MessageRole::User, "hello".to_string()),
                (MessageRole::Assistant, "hi there".to_string()),
            ]
        );
    }

    #[test]
    fn read_puts_summary_first() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&SessionLog {
                summary: Some(Summary::new("s")),
                messages: vec![ChatMessage::user("u")],
            })
            .unwrap();

        let effective = store.read().unwrap();
        assert_eq!(effective.len(), 2);
        assert_eq!(effective[0].role, MessageRole::System);
        assert!(effective[0].content.starts_with(crate::message::SUMMARY_PREFIX));
        assert_eq!(effective[1].content, "u");
    }

    #[test]
    fn clear_truncates_but_keeps_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&SessionLog {
                summary: None,
                messages: vec![ChatMessage::user("u")],
            })
            .unwrap();

        store.clear().unwrap();
        assert!(store.path().exists());
        assert_eq!(fs::read(store.path()).unwrap().len(), 0);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn rejects_path_like_session_ids() {
        let dir = TempDir::new().unwrap();
        for id in ["", "..", "a/b", "a\\b", " "] {
            assert!(matches!(
                FileHistoryStore::new(dir.path(), id),
                Err(MemoryError::InvalidSessionId(_))
            ));
        }
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();
        let store = FileHistoryStore::new(&blocker, "doc.md").unwrap();

        let result = store.save(&SessionLog::default());
        assert!(matches!(result, Err(MemoryError::Storage { .. })));
    }
}
