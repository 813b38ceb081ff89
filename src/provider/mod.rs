//! Model provider abstraction
//!
//! A provider turns a conversation history into one generated reply.
//! Failures surface as [`Error::Provider`](crate::error::Error::Provider);
//! the pipeline makes at most one attempt per turn and never retries.

mod echo;
mod openai;

pub use echo::EchoProvider;
pub use openai::OpenAiCompatProvider;

use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Role of a chat message sent to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One message in the history sent to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Pluggable model provider interface
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate one reply for the given conversation history.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Build the named provider from configuration and resolved API keys.
pub fn provider_from_config(
    models: &ModelsConfig,
    resolved_keys: &HashMap<String, String>,
    provider_name: &str,
) -> Result<Arc<dyn ModelProvider>> {
    let cfg = models.providers.get(provider_name).ok_or_else(|| {
        Error::Config(format!("unknown model provider '{}'", provider_name))
    })?;

    if provider_name == "echo" {
        return Ok(Arc::new(EchoProvider::new(&cfg.default_model)));
    }

    let api_key = resolved_keys.get(provider_name).ok_or_else(|| {
        Error::Config(format!(
            "no API key for provider '{}' (set ${})",
            provider_name,
            cfg.api_key_ref.to_uppercase()
        ))
    })?;

    let provider = OpenAiCompatProvider::new(
        provider_name,
        cfg.base_url.as_deref().unwrap_or("https://api.openai.com/v1"),
        api_key,
        &cfg.default_model,
        cfg.request_timeout_secs,
    )?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_echo() {
        let models = ModelsConfig::default();
        let provider = provider_from_config(&models, &HashMap::new(), "echo").unwrap();
        assert_eq!(provider.name(), "echo");
    }

    #[test]
    fn test_factory_unknown_provider() {
        let models = ModelsConfig::default();
        let err = match provider_from_config(&models, &HashMap::new(), "nope") {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_factory_missing_key() {
        let models = ModelsConfig::default();
        let err = match provider_from_config(&models, &HashMap::new(), "openai") {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_factory_openai_with_key() {
        let models = ModelsConfig::default();
        let mut keys = HashMap::new();
        keys.insert("openai".to_string(), "sk-test".to_string());
        let provider = provider_from_config(&models, &keys, "openai").unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_chat_role_strings() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
    }
}
