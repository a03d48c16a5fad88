/// Text completion provider trait and shared types.
///
/// The provider is the only component that talks to a model. Retries and
/// backoff, if any, belong to an implementation of this trait.
pub mod http;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while obtaining a completion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("provider returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed response envelope: {0}")]
    Envelope(String),

    #[error("provider failed: {0}")]
    Failed(String),
}

/// Given a prompt, returns the completion text or fails.
///
/// Implementations must be `Send + Sync` so a single provider can be shared
/// behind `Arc` by the analyzer's worker task.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str {
        "provider"
    }
}
