//! Language model abstraction.
//!
//! `LanguageModel` is the seam between Attune and whatever backend produces
//! text: a hosted API, a local model, or a scripted stub in tests. The
//! runtime only ever talks to the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::ChatMessage;

fn default_temperature() -> f32 {
    0.7
}

/// A request for text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage reported by a backend, when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Generate a response for the given request.
    async fn generate(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ModelError>;

    /// Count tokens in a text as this model would.
    ///
    /// The default is a character heuristic; backends with a real
    /// tokenizer should override it.
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            0
        } else {
            (text.len() + 3) / 4
        }
    }
}

/// Synchronous token counting, separable from generation.
///
/// Context assembly needs counts on a hot path without an async hop, so
/// this stays a plain trait.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(req.temperature, 0.7);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn request_builders() {
        let req = ChatRequest::new(vec![])
            .with_temperature(0.2)
            .with_max_tokens(128);
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.max_tokens, Some(128));
    }

    #[test]
    fn request_deserializes_without_temperature() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert_eq!(req.temperature, 0.7);
    }
}
