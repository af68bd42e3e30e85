//! Deterministic mock generator for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::try_stream;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::AiError;

use super::{FinishReason, GenerationRequest, StreamChunk, StreamResult, TextGenerator};

/// Deterministic step for scripted mock generations.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Stream the given fragments in order.
    Chunks(Vec<String>),
    /// Fail before producing any fragment.
    Error(String),
    /// Stream some fragments, then fail mid-stream.
    ErrorAfter { chunks: Vec<String>, message: String },
    /// Return a timeout-like error after the step delay.
    Timeout,
}

/// Scripted generation step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Chunks(vec![content.into()]),
        }
    }

    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Chunks(chunks.into_iter().map(Into::into).collect()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn error_after<I, S>(chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delay_ms: 0,
            kind: MockStepKind::ErrorAfter {
                chunks: chunks.into_iter().map(Into::into).collect(),
                message: message.into(),
            },
        }
    }

    pub fn timeout(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            kind: MockStepKind::Timeout,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock generator driven by scripted steps.
///
/// Every received request is recorded so tests can inspect prompts.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_step(&self, request: GenerationRequest) -> Option<MockStep> {
        self.requests.lock().await.push(request);
        self.script.lock().await.pop_front()
    }

    fn fallback_text(request: &GenerationRequest) -> String {
        request
            .messages
            .iter()
            .rev()
            .find(|msg| matches!(msg.role, super::Role::User))
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string())
    }
}

impl TextGenerator for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn stream_generate(&self, request: GenerationRequest) -> StreamResult {
        let client = self.clone();
        Box::pin(try_stream! {
            let fallback = Self::fallback_text(&request);
            let step = client
                .next_step(request)
                .await
                .unwrap_or_else(|| MockStep::text(fallback));

            if step.delay_ms > 0 {
                sleep(Duration::from_millis(step.delay_ms)).await;
            }

            match step.kind {
                MockStepKind::Chunks(chunks) => {
                    for chunk in chunks {
                        yield StreamChunk::text(chunk);
                    }
                    yield StreamChunk::final_chunk(FinishReason::Stop);
                }
                MockStepKind::Error(message) => {
                    Err(AiError::Llm(message))?;
                }
                MockStepKind::ErrorAfter { chunks, message } => {
                    for chunk in chunks {
                        yield StreamChunk::text(chunk);
                    }
                    Err(AiError::Stream(message))?;
                }
                MockStepKind::Timeout => {
                    Err(AiError::Llm("mock timeout".to_string()))?;
                }
            }
        })
    }
}
