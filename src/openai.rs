//! OpenAI-compatible client configuration.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

use crate::config::LlmSettings;
use crate::error::{AgentError, Result};

/// Create a client from LLM settings.
///
/// `api_base` lets the same client talk to any OpenAI-compatible endpoint
/// (Gemini, OpenRouter, a local Ollama).
pub fn create_client_with(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    if settings.model.is_empty() {
        return Err(AgentError::Config("llm.model must not be empty".to_string()));
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = settings.api_base.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }
    if let Some(key) = settings.resolved_api_key() {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_rejected() {
        let settings = LlmSettings {
            model: String::new(),
            ..LlmSettings::default()
        };
        assert!(matches!(create_client_with(&settings), Err(AgentError::Config(_))));
    }
}
