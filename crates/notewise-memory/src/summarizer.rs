//! Summarization hook used by the rollup loop.

use std::sync::Arc;

use async_trait::async_trait;
use notewise_ai::{GenerationRequest, Message, TextGenerator, collect_text};
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::message::ChatMessage;

pub const SUMMARY_PROMPT: &str = include_str!("templates/summary_prompt.md");

/// Turns the previous summary plus the messages being cut into a new summary.
///
/// The returned text replaces the previous summary entirely.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(
        &self,
        old_summary: Option<&str>,
        old_messages: &[ChatMessage],
    ) -> Result<String>;
}

/// Summarizer backed by a streaming text generator.
#[derive(Clone)]
pub struct LlmSummarizer {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Render the prior summary and the transcript as one block of text.
    pub fn format_input(old_summary: Option<&str>, old_messages: &[ChatMessage]) -> String {
        let mut lines = Vec::with_capacity(old_messages.len() + 2);
        if let Some(summary) = old_summary.filter(|s| !s.is_empty()) {
            lines.push(format!("Existing summary:\n{summary}"));
        }
        lines.push("Conversation:".to_string());
        for message in old_messages {
            lines.push(format!("{}: {}", message.role.label(), message.content));
        }
        lines.join("\n")
    }

    pub fn build_request(
        old_summary: Option<&str>,
        old_messages: &[ChatMessage],
    ) -> GenerationRequest {
        let conversation = Self::format_input(old_summary, old_messages);
        GenerationRequest::new(vec![
            Message::system(SUMMARY_PROMPT.trim()),
            Message::user(format!(
                "Update the summary using the conversation below.\n\n{conversation}"
            )),
        ])
    }
}

#[async_trait]
impl Summarize for LlmSummarizer {
    async fn summarize(
        &self,
        old_summary: Option<&str>,
        old_messages: &[ChatMessage],
    ) -> Result<String> {
        let request = Self::build_request(old_summary, old_messages);
        let text = collect_text(self.generator.stream_generate(request))
            .await
            .map_err(MemoryError::Summarization)?;

        let summary = text.trim();
        if summary.is_empty() {
            return Err(MemoryError::EmptySummary);
        }
        debug!(
            messages = old_messages.len(),
            summary_chars = summary.chars().count(),
            "Generated conversation summary"
        );
        Ok(summary.to_string())
    }
}
