//! LLM module - streaming text-generation abstraction

mod client;
mod factory;
#[cfg(any(test, feature = "test-utils"))]
mod mock_client;
mod openai;
mod retry;
mod swappable;

pub use client::{
    FinishReason, GenerationRequest, Message, Role, StreamChunk, StreamResult, TextGenerator,
    collect_text,
};
pub use factory::{LlmSettings, create_generator};
#[cfg(any(test, feature = "test-utils"))]
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};
pub use openai::OpenAICompatibleClient;
pub use retry::{LlmRetryConfig, response_to_error};
pub use swappable::SwappableGenerator;
