//! Deterministic local provider for development and tests
//!
//! No external API calls, no credentials. Echoes the model name and a
//! snippet of the last user message so the full pipeline can be exercised
//! offline.

use crate::error::Result;
use crate::provider::{ChatMessage, ChatRole, ModelProvider};
use async_trait::async_trait;

const SNIPPET_LEN: usize = 80;

/// Local fake provider with deterministic responses
pub struct EchoProvider {
    model: String,
}

impl EchoProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ModelProvider for EchoProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let snippet: String = last_user.chars().take(SNIPPET_LEN).collect();

        Ok(format!(
            "[{}] You said: \"{}\". This is a locally generated response; configure a real model provider for live answers.",
            self.model, snippet
        ))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_last_user_message() {
        let provider = EchoProvider::new("echo-1");
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second question"),
        ];
        let reply = provider.generate(&messages).await.unwrap();
        assert!(reply.contains("second question"));
        assert!(reply.contains("[echo-1]"));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = EchoProvider::new("echo-1");
        let messages = vec![ChatMessage::user("same input")];
        let a = provider.generate(&messages).await.unwrap();
        let b = provider.generate(&messages).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let provider = EchoProvider::new("echo-1");
        let reply = provider.generate(&[]).await.unwrap();
        assert!(reply.contains("[echo-1]"));
    }

    #[tokio::test]
    async fn test_long_message_truncated() {
        let provider = EchoProvider::new("echo-1");
        let long = "x".repeat(500);
        let reply = provider.generate(&[ChatMessage::user(long)]).await.unwrap();
        assert!(reply.len() < 400);
    }
}
