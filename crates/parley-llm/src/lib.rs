pub mod openai;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Who authored a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation.
///
/// Immutable once created; order within a conversation is significant and
/// fed verbatim to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

/// Options controlling a single completion request.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Per-request HTTP timeout. Exceeding it surfaces as a provider failure.
    pub timeout: Option<Duration>,
}

/// Errors from LLM operations.
#[derive(Debug)]
pub enum LlmError {
    Api { status: u16, body: String },
    Network(String),
    Parse(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { status, body } => write!(f, "API error ({status}): {body}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// A pending completion request.
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = exn::Result<String, LlmError>> + Send + 'a>>;

/// An LLM provider that returns a single best completion.
pub trait Provider: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// The model identifier used in API requests.
    fn model_id(&self) -> &str;

    /// Request one completion for the given conversation.
    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a GenOptions,
    ) -> CompletionFuture<'a>;
}
