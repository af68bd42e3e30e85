//! OpenAI-compatible streaming provider
//!
//! Speaks the `/chat/completions` server-sent-events dialect shared by OpenAI
//! and DashScope's compatible mode.

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::http_client::build_http_client;
use crate::llm::client::{
    FinishReason, GenerationRequest, StreamChunk, StreamResult, TextGenerator,
};
use crate::llm::retry::{LlmRetryConfig, response_to_error};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen3-max";

const PROVIDER: &str = "openai-compatible";

/// OpenAI-compatible client
pub struct OpenAICompatibleClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    retry_config: LlmRetryConfig,
}

impl OpenAICompatibleClient {
    /// Create a new client with the default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            retry_config: LlmRetryConfig::default(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Default temperature applied when a request carries none
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_retry_config(mut self, config: LlmRetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OpenAIStreamRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

impl TextGenerator for OpenAICompatibleClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn stream_generate(&self, request: GenerationRequest) -> StreamResult {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/chat/completions", self.base_url);
        let retry_config = self.retry_config.clone();
        let body = OpenAIStreamRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens,
            stream: true,
        };

        Box::pin(async_stream::stream! {
            // Only the initial request is retried; once bytes flow the
            // consumer owns the partial output.
            let mut attempt = 0;
            let response = loop {
                let error = match client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", api_key))
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => break resp,
                    Ok(resp) => response_to_error(resp, PROVIDER).await,
                    Err(e) => AiError::Http(e),
                };

                if !error.is_retryable() || attempt >= retry_config.max_retries {
                    yield Err(error);
                    return;
                }

                attempt += 1;
                let delay = retry_config.delay_for(attempt, error.retry_after());
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying generation request"
                );
                tokio::time::sleep(delay).await;
            };

            let mut byte_stream = response.bytes_stream();
            let mut pending = Vec::new();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AiError::Stream(e.to_string()));
                        return;
                    }
                };

                pending.extend_from_slice(&bytes);
                push_text(&mut buffer, &take_utf8(&mut pending));

                for data in drain_sse_data(&mut buffer) {
                    for chunk in chunks_from_payload(&data) {
                        yield Ok(chunk);
                    }
                }
            }

            // The last event may lack its trailing blank line.
            let rest = String::from_utf8_lossy(&pending).into_owned();
            push_text(&mut buffer, &rest);
            buffer.push_str("\n\n");
            for data in drain_sse_data(&mut buffer) {
                for chunk in chunks_from_payload(&data) {
                    yield Ok(chunk);
                }
            }
        })
    }
}

/// Decode the longest valid UTF-8 prefix of `pending`, keeping a split
/// multi-byte sequence for the next read.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(err) if err.error_len().is_none() => {
            let valid = err.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

fn push_text(buffer: &mut String, text: &str) {
    buffer.push_str(text);
    if buffer.contains("\r\n") {
        *buffer = buffer.replace("\r\n", "\n");
    }
}

/// Remove every complete SSE event from `buffer` and return their `data:` payloads.
fn drain_sse_data(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let event: String = buffer.drain(..pos + 2).collect();
        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
    }
    payloads
}

fn chunks_from_payload(data: &str) -> Vec<StreamChunk> {
    if data == "[DONE]" {
        return Vec::new();
    }

    let parsed: OpenAIStreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(error = %err, "Skipping unparseable stream payload");
            return Vec::new();
        }
    };

    let mut chunks = Vec::new();
    for choice in parsed.choices {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            chunks.push(StreamChunk::text(content));
        }

        if let Some(reason) = choice.finish_reason {
            let reason = match reason.as_str() {
                "stop" => FinishReason::Stop,
                "length" => FinishReason::MaxTokens,
                _ => FinishReason::Error,
            };
            chunks.push(StreamChunk::final_chunk(reason));
        }
    }
    chunks
}
