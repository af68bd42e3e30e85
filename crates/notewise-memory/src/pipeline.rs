//! History-aware generation pipeline.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use notewise_ai::{GenerationRequest, Message, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MemoryError, Result};
use crate::manager::{HistoryManager, SessionHistory};
use crate::message::ChatMessage;
use crate::prompt::{TaskKind, TaskParams};
use crate::resolver::SessionResolver;

/// Event emitted to the caller of a streamed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk { content: String },
    Complete,
    Error { message: String },
}

impl StreamEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self::Chunk {
            content: content.into(),
        }
    }

    pub fn error(err: &MemoryError) -> Self {
        Self::Error {
            message: err.user_message(),
        }
    }

    /// One JSON object, no trailing newline.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(r#"{{"type":"error","message":"event serialization failed: {err}"}}"#)
        })
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Conversation to continue once generation succeeds.
struct PendingTurn {
    history: SessionHistory,
    user_turn: String,
}

struct PreparedTask {
    messages: Vec<Message>,
    pending: Option<PendingTurn>,
}

/// Runs a task against the generator, threading session history for tasks
/// that have it.
#[derive(Clone)]
pub struct ChatPipeline {
    generator: Arc<dyn TextGenerator>,
    history: Arc<HistoryManager>,
    resolver: SessionResolver,
}

impl ChatPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, history: Arc<HistoryManager>) -> Self {
        Self {
            generator,
            history,
            resolver: SessionResolver::new(),
        }
    }

    pub fn history(&self) -> &Arc<HistoryManager> {
        &self.history
    }

    /// Stream a task as events.
    ///
    /// The stream ends with either `Complete` or exactly one `Error`. The
    /// user/assistant pair is recorded only after generation has finished
    /// without error.
    pub fn stream(&self, task_type: &str, params: TaskParams) -> EventStream {
        let pipeline = self.clone();
        let task_type = task_type.to_string();

        Box::pin(stream! {
            let prepared = match pipeline.prepare(&task_type, &params).await {
                Ok(prepared) => prepared,
                Err(err) => {
                    error!(task = %task_type, error = %err, "Task rejected");
                    yield StreamEvent::error(&err);
                    return;
                }
            };

            let mut chunks = pipeline
                .generator
                .stream_generate(GenerationRequest::new(prepared.messages));
            let mut collected = String::new();
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        if chunk.text.is_empty() {
                            continue;
                        }
                        collected.push_str(&chunk.text);
                        yield StreamEvent::chunk(chunk.text);
                    }
                    Err(err) => {
                        let err = MemoryError::Generation(err);
                        error!(task = %task_type, error = %err, "Generation failed");
                        yield StreamEvent::error(&err);
                        return;
                    }
                }
            }

            if let Some(pending) = prepared.pending {
                let turn = vec![
                    ChatMessage::user(pending.user_turn),
                    ChatMessage::assistant(collected),
                ];
                if let Err(err) = pending.history.append(turn).await {
                    error!(
                        session_id = %pending.history.session_id(),
                        error = %err,
                        "Failed to record conversation turn"
                    );
                    yield StreamEvent::error(&err);
                    return;
                }
            }

            yield StreamEvent::Complete;
        })
    }

    async fn prepare(&self, task_type: &str, params: &TaskParams) -> Result<PreparedTask> {
        let kind: TaskKind = task_type.parse()?;
        let human = kind.render_human(params)?;

        let mut messages = vec![kind.system_message()];
        let pending = match kind.history_key() {
            Some(key) => {
                let session_id = self.resolver.resolve_kind(kind, params)?;
                let history = self.history.get_history(&session_id)?;
                let past = history.read().await?;
                info!(
                    task = %kind,
                    session_id = %session_id,
                    history_messages = past.len(),
                    "Continuing session"
                );
                messages.extend(past.iter().map(ChatMessage::to_llm));

                let user_turn = params
                    .get(key)
                    .cloned()
                    .ok_or_else(|| MemoryError::MissingParameter(key.to_string()))?;
                Some(PendingTurn { history, user_turn })
            }
            None => None,
        };
        messages.push(Message::user(human));

        Ok(PreparedTask { messages, pending })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use notewise_ai::{MockLlmClient, MockStep, Role};
    use tempfile::TempDir;

    use super::*;
    use crate::rollup::RollupPolicy;

    fn params(pairs: &[(&str, &str)]) -> TaskParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pipeline(dir: &TempDir, steps: Vec<MockStep>) -> (ChatPipeline, Arc<MockLlmClient>) {
        let client = Arc::new(MockLlmClient::from_steps("mock", steps));
        let manager = Arc::new(HistoryManager::new(dir.path(), RollupPolicy::default()));
        (ChatPipeline::new(client.clone(), manager), client)
    }

    #[test]
    fn events_serialize_as_tagged_json() {
        assert_eq!(
            StreamEvent::chunk("hi").to_json_line(),
            r#"{"type":"chunk","content":"hi"}"#
        );
        assert_eq!(StreamEvent::Complete.to_json_line(), r#"{"type":"complete"}"#);
    }

    #[tokio::test]
    async fn optimize_streams_without_touching_history() {
        let dir = TempDir::new().unwrap();
        let (pipeline, client) = pipeline(&dir, vec![MockStep::chunks(["# T", "itle"])]);

        let events: Vec<_> = pipeline
            .stream("optimize", params(&[("content", "title")]))
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("# T"),
                StreamEvent::chunk("itle"),
                StreamEvent::Complete
            ]
        );

        let request = &client.requests().await[0];
        assert_eq!(request.messages.len(), 2);
        assert!(pipeline.history().list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn advise_records_turn_and_replays_it_next_time() {
        let dir = TempDir::new().unwrap();
        let (pipeline, client) = pipeline(
            &dir,
            vec![MockStep::text("first answer"), MockStep::text("second answer")],
        );
        let request = |question: &str| {
            params(&[
                ("content", "body"),
                ("question", question),
                ("filename", "notes/doc.md"),
            ])
        };

        let _: Vec<_> = pipeline.stream("advise", request("one?")).collect().await;
        let _: Vec<_> = pipeline.stream("advise", request("two?")).collect().await;

        let second = &client.requests().await[1];
        let roles: Vec<_> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(second.messages[1].content, "one?");
        assert_eq!(second.messages[2].content, "first answer");

        let log = pipeline
            .history()
            .get_history("doc.md")
            .unwrap()
            .load()
            .await
            .unwrap();
        assert_eq!(log.round_count(), 2);
    }

    #[tokio::test]
    async fn failed_generation_emits_one_error_and_records_nothing() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(&dir, vec![MockStep::error_after(["partial"], "reset")]);

        let events: Vec<_> = pipeline
            .stream(
                "edit",
                params(&[("content", "c"), ("requirement", "r"), ("filename", "doc.md")]),
            )
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::chunk("partial"));
        match &events[1] {
            StreamEvent::Error { message } => assert!(message.starts_with("Processing failed: ")),
            other => panic!("unexpected event: {other:?}"),
        }
        let log = pipeline
            .history()
            .get_history("doc.md")
            .unwrap()
            .load()
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn parameter_errors_are_reported_verbatim() {
        let dir = TempDir::new().unwrap();
        let (pipeline, client) = pipeline(&dir, Vec::new());

        let events: Vec<_> = pipeline
            .stream("advise", params(&[("content", "c"), ("question", "q")]))
            .collect()
            .await;
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "Missing required parameter: filename".to_string()
            }]
        );
        assert_eq!(client.request_count().await, 0);
    }
}
