//! Generator handle that survives LLM settings changes

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::info;

use crate::error::Result;
use crate::llm::client::{GenerationRequest, StreamResult, TextGenerator};
use crate::llm::factory::{LlmSettings, create_generator};

/// Shared generator whose backing client can be replaced at runtime.
///
/// The pipeline and the summarizer hold the same handle, so a rebuild
/// reaches both. A stream that already started keeps the client it was
/// created from.
pub struct SwappableGenerator {
    active: RwLock<Arc<dyn TextGenerator>>,
    generation: AtomicU64,
}

impl SwappableGenerator {
    pub fn new(client: Arc<dyn TextGenerator>) -> Self {
        Self {
            active: RwLock::new(client),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        Ok(Self::new(create_generator(settings)?))
    }

    /// Build a client from `settings` and install it.
    ///
    /// On error the active client is left as it was.
    pub fn rebuild(&self, settings: &LlmSettings) -> Result<u64> {
        let client = create_generator(settings)?;
        self.swap(client);
        let generation = self.generation();
        info!(
            model = %settings.model,
            base_url = %settings.base_url,
            generation,
            "Language model client rebuilt"
        );
        Ok(generation)
    }

    /// Install `client` and return the one it replaced.
    pub fn swap(&self, client: Arc<dyn TextGenerator>) -> Arc<dyn TextGenerator> {
        let previous = std::mem::replace(&mut *self.active.write(), client);
        self.generation.fetch_add(1, Ordering::SeqCst);
        previous
    }

    /// Client that new requests go to right now.
    pub fn current(&self) -> Arc<dyn TextGenerator> {
        self.active.read().clone()
    }

    /// Number of swaps since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn current_provider(&self) -> String {
        self.active.read().provider().to_string()
    }

    pub fn current_model(&self) -> String {
        self.active.read().model().to_string()
    }
}

impl TextGenerator for SwappableGenerator {
    fn provider(&self) -> &str {
        "swappable"
    }

    fn model(&self) -> &str {
        "dynamic"
    }

    fn stream_generate(&self, request: GenerationRequest) -> StreamResult {
        self.current().stream_generate(request)
    }
}
