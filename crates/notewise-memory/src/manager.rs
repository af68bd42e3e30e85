//! History orchestration: store, rollup policy and summarizer per session.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use notewise_ai::TextGenerator;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::NotewiseConfig;
use crate::error::{MemoryError, Result};
use crate::message::{ChatMessage, Summary};
use crate::rollup::RollupPolicy;
use crate::store::{FileHistoryStore, SESSION_FILE_EXT, SessionLog};
use crate::summarizer::{LlmSummarizer, Summarize};

/// Hands out per-session histories that share one policy and summarizer.
///
/// Every session id gets one async mutex; all operations on a session's
/// file go through it, so concurrent appends to the same session run one
/// after another.
pub struct HistoryManager {
    sessions_dir: PathBuf,
    policy: RollupPolicy,
    summarizer: Option<Arc<dyn Summarize>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HistoryManager {
    pub fn new(sessions_dir: impl Into<PathBuf>, policy: RollupPolicy) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            policy,
            summarizer: None,
            locks: DashMap::new(),
        }
    }

    /// Manager for the configured sessions directory. Rollup is enabled
    /// only when a generator is supplied.
    pub fn from_config(
        config: &NotewiseConfig,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Result<Self> {
        let manager = Self::new(config.sessions_dir.clone(), config.rollup_policy()?);
        Ok(match generator {
            Some(generator) => manager.with_summarizer(Arc::new(LlmSummarizer::new(generator))),
            None => manager,
        })
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarize>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn policy(&self) -> RollupPolicy {
        self.policy
    }

    /// History bound to `session_id`.
    pub fn get_history(&self, session_id: &str) -> Result<SessionHistory> {
        let store = FileHistoryStore::new(&self.sessions_dir, session_id)?;
        self.prune_idle_locks();
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Ok(SessionHistory {
            store,
            policy: self.policy,
            summarizer: self.summarizer.clone(),
            lock,
        })
    }

    /// Drop locks that no live `SessionHistory` holds.
    fn prune_idle_locks(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Ids of every persisted session, sorted.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::storage(&self.sessions_dir, err)),
        };

        let suffix = format!(".{SESSION_FILE_EXT}");
        let mut sessions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .collect();
        sessions.sort();
        Ok(sessions)
    }
}

/// One session's history, ready to read or extend.
#[derive(Clone)]
pub struct SessionHistory {
    store: FileHistoryStore,
    policy: RollupPolicy,
    summarizer: Option<Arc<dyn Summarize>>,
    lock: Arc<Mutex<()>>,
}

impl SessionHistory {
    pub fn session_id(&self) -> &str {
        self.store.session_id()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub async fn load(&self) -> Result<SessionLog> {
        let _guard = self.lock.lock().await;
        self.store.load()
    }

    /// Effective history: summary marker first, then resident messages.
    pub async fn read(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.load().await?.effective_messages())
    }

    /// Append messages, roll up if over budget, and persist.
    ///
    /// Nothing is written unless every summarization step succeeds.
    pub async fn append(&self, new_messages: Vec<ChatMessage>) -> Result<SessionLog> {
        let _guard = self.lock.lock().await;

        let mut log = self.store.load()?;
        log.messages.extend(new_messages);
        let log = self.roll_up(log).await?;
        self.store.save(&log)?;

        debug!(
            session_id = %self.session_id(),
            messages = log.messages.len(),
            rounds = log.round_count(),
            "Session history saved"
        );
        Ok(log)
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.clear()?;
        info!(session_id = %self.session_id(), "Session history cleared");
        Ok(())
    }

    async fn roll_up(&self, mut log: SessionLog) -> Result<SessionLog> {
        let Some(summarizer) = &self.summarizer else {
            return Ok(log);
        };

        while self.policy.exceeds_budget(&log.messages) {
            let (old, tail) = self.policy.split(std::mem::take(&mut log.messages));
            log.messages = tail;
            if old.is_empty() {
                break;
            }

            let old_summary = log.summary.as_ref().map(|s| s.content.as_str());
            let content = summarizer.summarize(old_summary, &old).await?;
            // The cut prefix is only dropped once a real summary replaces it.
            let content = content.trim();
            if content.is_empty() {
                return Err(MemoryError::EmptySummary);
            }
            log.summary = Some(Summary::new(content));

            info!(
                session_id = %self.session_id(),
                cutoff = old.len(),
                rounds = log.round_count(),
                "Rolled up session history"
            );
        }
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::message::MessageRole;

    #[derive(Default)]
    struct CountingSummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarize for CountingSummarizer {
        async fn summarize(
            &self,
            old_summary: Option<&str>,
            old_messages: &[ChatMessage],
        ) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(
                "summary#{call} prev={} cut={}",
                old_summary.unwrap_or("-"),
                old_messages.len()
            ))
        }
    }

    struct BlankSummarizer;

    #[async_trait]
    impl Summarize for BlankSummarizer {
        async fn summarize(&self, _: Option<&str>, _: &[ChatMessage]) -> Result<String> {
            Ok("  \n".to_string())
        }
    }

    fn turn(i: usize) -> Vec<ChatMessage> {
        vec![
            ChatMessage::user(format!("q{i}")),
            ChatMessage::assistant(format!("a{i}")),
        ]
    }

    #[tokio::test]
    async fn append_without_summarizer_never_rolls_up() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::new(2, 1).unwrap());
        let history = manager.get_history("doc.md").unwrap();

        for i in 0..5 {
            history.append(turn(i)).await.unwrap();
        }
        let log = history.load().await.unwrap();
        assert!(log.summary.is_none());
        assert_eq!(log.round_count(), 5);
    }

    #[tokio::test]
    async fn large_append_loops_until_within_budget() {
        let dir = TempDir::new().unwrap();
        let summarizer = Arc::new(CountingSummarizer::default());
        let manager = HistoryManager::new(dir.path(), RollupPolicy::new(4, 2).unwrap())
            .with_summarizer(summarizer.clone());
        let history = manager.get_history("doc.md").unwrap();

        let batch: Vec<_> = (0..9).flat_map(turn).collect();
        let log = history.append(batch).await.unwrap();

        // 9 rounds -> 7 -> 5 -> 3
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(log.round_count(), 3);
        assert_eq!(log.messages[0].content, "q6");
        let summary = log.summary.unwrap().content;
        assert!(summary.starts_with("summary#3 prev=summary#2"));
    }

    #[tokio::test]
    async fn read_returns_summary_then_messages() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::new(1, 1).unwrap())
            .with_summarizer(Arc::new(CountingSummarizer::default()));
        let history = manager.get_history("doc.md").unwrap();

        history.append(turn(0)).await.unwrap();
        history.append(turn(1)).await.unwrap();

        let effective = history.read().await.unwrap();
        assert_eq!(effective.len(), 3);
        assert_eq!(effective[0].role, MessageRole::System);
        assert_eq!(effective[1].content, "q1");
    }

    #[tokio::test]
    async fn list_sessions_is_sorted_and_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::default());
        manager.get_history("b.md").unwrap().append(turn(0)).await.unwrap();
        manager.get_history("a.md").unwrap().clear().await.unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(manager.list_sessions().unwrap(), vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn list_sessions_on_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path().join("absent"), RollupPolicy::default());
        assert!(manager.list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_summary_fails_append_and_keeps_file() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::new(2, 1).unwrap())
            .with_summarizer(Arc::new(BlankSummarizer));
        let history = manager.get_history("doc.md").unwrap();

        history.append(turn(0)).await.unwrap();
        history.append(turn(1)).await.unwrap();
        let before = fs::read(history.path()).unwrap();

        let err = history.append(turn(2)).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmptySummary));
        assert_eq!(fs::read(history.path()).unwrap(), before);

        let log = history.load().await.unwrap();
        assert!(log.summary.is_none());
        assert_eq!(log.round_count(), 2);
        assert_eq!(log.messages[0].content, "q0");
    }

    #[tokio::test]
    async fn append_reports_storage_error_when_save_fails() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::default());
        let history = manager.get_history("doc.md").unwrap();
        // A directory in place of the temp file makes the atomic write fail.
        fs::create_dir(dir.path().join("doc.md.jsonl.tmp")).unwrap();

        let err = history.append(turn(0)).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage { .. }));
        assert!(!history.path().exists());
    }

    #[tokio::test]
    async fn clear_reports_storage_error() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::default());
        let history = manager.get_history("doc.md").unwrap();
        fs::create_dir(history.path()).unwrap();

        let err = history.clear().await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage { .. }));
    }

    #[tokio::test]
    async fn idle_session_locks_are_pruned() {
        let dir = TempDir::new().unwrap();
        let manager = HistoryManager::new(dir.path(), RollupPolicy::default());

        let first = manager.get_history("a.md").unwrap();
        let again = manager.get_history("a.md").unwrap();
        assert!(Arc::ptr_eq(&first.lock, &again.lock));
        drop(first);
        drop(again);

        let _other = manager.get_history("b.md").unwrap();
        assert_eq!(manager.locks.len(), 1);
        assert!(manager.locks.contains_key("b.md"));
    }
}
