//! Core types for the LLM backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use songforge_utils::error::GenerationError;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// One chat-completion invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Ordered conversation messages
    pub messages: Vec<Message>,
    /// Sampling temperature
    pub temperature: f32,
    /// Request-level timeout
    pub timeout: Duration,
}

impl ChatRequest {
    /// Common case: one system prompt and one user prompt.
    #[must_use]
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
            temperature,
            timeout,
        }
    }
}

/// Trait for LLM backend implementations.
///
/// The generator works against this trait, so providers can change and tests
/// can supply canned responses without any network.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Invoke the model and return its raw text response.
    ///
    /// # Errors
    /// Returns `GenerationError` for transport failures, provider errors
    /// (auth, quota, outage), timeouts, and empty responses.
    async fn complete(&self, request: ChatRequest) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_builds_system_then_user() {
        let req = ChatRequest::new("be a composer", "write a melody", 0.8, Duration::from_secs(60));
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.messages[1].content, "write a melody");
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
