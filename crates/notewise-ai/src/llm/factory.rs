//! Build a generator from configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::llm::client::TextGenerator;
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAICompatibleClient};

/// Connection settings for the hosted model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: None,
        }
    }
}

/// Construct the generator described by `settings`.
pub fn create_generator(settings: &LlmSettings) -> Result<Arc<dyn TextGenerator>> {
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AiError::Config("API key not found for the language model".to_string()))?;

    let mut client = OpenAICompatibleClient::new(api_key)
        .with_model(settings.model.clone())
        .with_base_url(settings.base_url.clone());
    if let Some(temperature) = settings.temperature {
        client = client.with_temperature(temperature);
    }

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_config_error() {
        let settings = LlmSettings::default();
        assert!(matches!(
            create_generator(&settings),
            Err(AiError::Config(_))
        ));

        let blank = LlmSettings {
            api_key: Some("   ".to_string()),
            ..LlmSettings::default()
        };
        assert!(create_generator(&blank).is_err());
    }

    #[test]
    fn generator_uses_configured_model() {
        let settings = LlmSettings {
            api_key: Some("sk-test".to_string()),
            model: "qwen-plus".to_string(),
            ..LlmSettings::default()
        };
        let generator = create_generator(&settings).unwrap();
        assert_eq!(generator.model(), "qwen-plus");
    }

    #[test]
    fn settings_fill_defaults_from_partial_toml() {
        let settings: LlmSettings = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }
}
