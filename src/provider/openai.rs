//! OpenAI-compatible chat-completions provider
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format (OpenAI, Azure OpenAI, local inference gateways).

use crate::error::{Error, Result};
use crate::provider::{ChatMessage, ModelProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const COMPLETIONS_PATH: &str = "/chat/completions";

/// Provider speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl OpenAiCompatProvider {
    /// Create a provider for the given endpoint and model.
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), COMPLETIONS_PATH),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Provider(format!("model request timed out: {}", e))
                } else {
                    Error::Provider(format!("model request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "model endpoint returned {}: {}",
                status, body
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed model response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("model response has no choices".to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatRole;

    fn create_test_provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("openai", "https://api.openai.com/v1/", "sk-test", "gpt-4o-mini", 60)
            .unwrap()
    }

    #[test]
    fn test_endpoint_built_from_base_url() {
        let provider = create_test_provider();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("hello"),
        ];
        let request = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_response_parsing() {
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        });
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hi there");
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let msg = ChatMessage {
            role: ChatRole::Assistant,
            content: "x".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
