use pf_domain::error::Result;
use pf_domain::stream::{BoxStream, StreamEvent, Usage};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the conversation sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
    /// The conversation messages to send, in order.
    pub messages: Vec<ChatMessage>,
    /// System prompt for providers that carry it separately; providers
    /// that do not fold it into the message list.
    pub system: Option<String>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Sequences that stop generation early.
    pub stop: Vec<String>,
}

/// A provider-agnostic completion response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Textual content of the response.
    pub content: String,
    /// The reason the model stopped generating (e.g. "stop", "length").
    pub finish_reason: Option<String>,
    /// Token usage information, when the provider reports it.
    pub usage: Option<Usage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM backend must implement.
///
/// Implementations are provider-specific adapters (Anthropic,
/// OpenAI-compatible) that translate between our internal types and the
/// wire format of each provider's HTTP API.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// A unique name for this provider instance (the registry key).
    fn name(&self) -> &str;

    /// Send a completion request and wait for the full response.
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse>;

    /// Send a completion request and return a stream of events.
    async fn generate_stream(
        &self,
        req: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Whether this backend supports streamed responses.
    fn supports_streaming(&self) -> bool {
        true
    }
}
