//! Wiring of generator, history and pipeline from configuration.

use std::sync::Arc;

use notewise_ai::{AiError, LlmSettings, SwappableGenerator, TextGenerator};
use tracing::info;

use crate::config::NotewiseConfig;
use crate::error::{MemoryError, Result};
use crate::manager::HistoryManager;
use crate::pipeline::ChatPipeline;

/// Everything a caller needs to run tasks against one configuration.
///
/// The pipeline and the rollup summarizer share one [`SwappableGenerator`],
/// so [`reload_llm`](Self::reload_llm) changes the model for both without
/// dropping the per-session locks.
pub struct NotewiseRuntime {
    generator: Arc<SwappableGenerator>,
    history: Arc<HistoryManager>,
    pipeline: ChatPipeline,
}

impl NotewiseRuntime {
    pub fn from_config(config: &NotewiseConfig) -> Result<Self> {
        let generator = SwappableGenerator::from_settings(&config.llm).map_err(settings_error)?;
        Self::assemble(config, Arc::new(generator))
    }

    /// Runtime over an already built client instead of `config.llm`.
    pub fn with_generator(config: &NotewiseConfig, client: Arc<dyn TextGenerator>) -> Result<Self> {
        Self::assemble(config, Arc::new(SwappableGenerator::new(client)))
    }

    fn assemble(config: &NotewiseConfig, generator: Arc<SwappableGenerator>) -> Result<Self> {
        let shared: Arc<dyn TextGenerator> = generator.clone();
        let history = Arc::new(HistoryManager::from_config(config, Some(shared.clone()))?);
        let pipeline = ChatPipeline::new(shared, history.clone());
        info!(
            sessions_dir = %config.sessions_dir.display(),
            model = %generator.current_model(),
            "Runtime ready"
        );
        Ok(Self {
            generator,
            history,
            pipeline,
        })
    }

    /// Rebuild the language model client from new settings.
    ///
    /// Invalid settings leave the running client in place.
    pub fn reload_llm(&self, settings: &LlmSettings) -> Result<()> {
        self.generator.rebuild(settings).map_err(settings_error)?;
        Ok(())
    }

    pub fn pipeline(&self) -> &ChatPipeline {
        &self.pipeline
    }

    pub fn history(&self) -> &Arc<HistoryManager> {
        &self.history
    }

    pub fn generator(&self) -> &Arc<SwappableGenerator> {
        &self.generator
    }
}

fn settings_error(err: AiError) -> MemoryError {
    match err {
        AiError::Config(message) => MemoryError::Config(message),
        other => MemoryError::Generation(other),
    }
}
