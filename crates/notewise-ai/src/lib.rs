//! Notewise AI - text-generation capability
//!
//! This crate provides:
//! - Chat message types shared with the memory layer
//! - The `TextGenerator` trait (streaming generation)
//! - An OpenAI-compatible streaming client with retry
//! - A hot-swappable generator wrapper for configuration rebuilds
//! - A scripted mock client (feature `test-utils`)

mod http_client;

pub mod error;
pub mod llm;

pub use error::{AiError, Result};
pub use llm::{
    FinishReason, GenerationRequest, LlmRetryConfig, LlmSettings, Message,
    OpenAICompatibleClient, Role, StreamChunk, StreamResult, SwappableGenerator, TextGenerator,
    collect_text, create_generator,
};

#[cfg(any(test, feature = "test-utils"))]
pub use llm::{MockLlmClient, MockStep};
