//! Cerebras chat-completions backend

use serde::{Deserialize, Serialize};
use tracing::debug;

use async_trait::async_trait;
use songforge_config::{API_KEY_VAR, CerebrasConfig};
use songforge_utils::error::{ConfigError, GenerationError};

use crate::http_client::HttpClient;
use crate::types::{ChatRequest, LlmBackend, Message, Role};

/// HTTP backend for the Cerebras chat-completions API.
#[derive(Clone)]
pub struct CerebrasBackend {
    client: HttpClient,
    api_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for CerebrasBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CerebrasBackend")
            .field("client", &self.client)
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl CerebrasBackend {
    /// Build a backend from validated configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingCredential` when no API key is present
    /// (the caller is expected to have validated already) and
    /// `GenerationError` wrapped as configuration failure never occurs here;
    /// HTTP client construction failures surface as `ConfigError::InvalidValue`.
    pub fn new(config: &CerebrasConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                var: API_KEY_VAR.to_string(),
            })?;

        let client = HttpClient::new().map_err(|e| ConfigError::InvalidValue {
            key: "http_client".to_string(),
            value: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmBackend for CerebrasBackend {
    async fn complete(&self, request: ChatRequest) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: wire_role(m),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
        };

        debug!(
            model = %self.model,
            temperature = request.temperature,
            timeout_secs = request.timeout.as_secs(),
            "invoking Cerebras backend"
        );

        let builder = reqwest::Client::new()
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute_with_retry(builder, request.timeout)
            .await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(content)
    }
}

fn wire_role(message: &Message) -> &'static str {
    match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Request body of the chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

/// Response body of the chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_requires_credential() {
        let config = CerebrasConfig::default();
        let err = CerebrasBackend::new(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
    }

    #[test]
    fn backend_builds_with_credential() {
        let mut config = CerebrasConfig::default();
        config.api_key = Some("sk-test".to_string());
        assert!(CerebrasBackend::new(&config).is_ok());
    }

    #[test]
    fn response_parsing_extracts_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }

    #[test]
    fn request_body_serializes_messages_in_order() {
        let body = ChatCompletionRequest {
            model: "zai-glm-4.6".to_string(),
            messages: vec![
                WireMessage {
                    role: "system",
                    content: "be brief".to_string(),
                },
                WireMessage {
                    role: "user",
                    content: "hi".to_string(),
                },
            ],
            temperature: 1.0,
        };
        let json = serde_json::to_string(&body).unwrap();
        let system_pos = json.find("system").unwrap();
        let user_pos = json.find("user").unwrap();
        assert!(system_pos < user_pos);
    }
}
