//! Notewise memory - durable conversation history for document tasks
//!
//! This crate provides:
//! - A JSONL session store with tolerant loading and atomic saves
//! - A round-based rollup policy and an LLM-backed summarizer
//! - `HistoryManager`, which serializes appends per session
//! - Session resolution, task prompts and a history-aware generation pipeline
//! - `NotewiseRuntime`, which wires a swappable generator into history and pipeline
//! - Orphan session cleanup and configuration loading

pub mod cleanup;
pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod paths;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod rollup;
pub mod runtime;
pub mod store;
pub mod summarizer;

pub use cleanup::SessionCleanup;
pub use config::{HistorySettings, NotewiseConfig};
pub use error::{MemoryError, Result};
pub use manager::{HistoryManager, SessionHistory};
pub use message::{ChatMessage, MessageRole, SUMMARY_PREFIX, Summary};
pub use pipeline::{ChatPipeline, EventStream, StreamEvent};
pub use prompt::{TaskKind, TaskParams};
pub use resolver::SessionResolver;
pub use rollup::RollupPolicy;
pub use runtime::NotewiseRuntime;
pub use store::{FileHistoryStore, SessionLog};
pub use summarizer::{LlmSummarizer, Summarize};
