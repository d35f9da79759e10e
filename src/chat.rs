//! Streaming chat completion consumer
//!
//! Sends a conversation to an `OpenAI`-compatible completion endpoint and
//! decodes the `data:`-prefixed response stream into incremental text.

mod client;
mod error;
#[cfg(test)]
mod proptests;
mod session;
mod sse;
mod stream;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::{ClientConfig, OpenRouterClient, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::{ChatError, ChatErrorKind};
pub use session::{ChatSession, Reply, SessionOptions};
pub use sse::{
    decode_line, decode_payload, LineSplitter, DATA_PREFIX, DONE_TOKEN, MAX_LINE_BYTES,
};
pub use stream::{ByteStream, StreamHandle, Termination};
pub use types::{ChatRequest, ConversationHistory, Role, StreamEvent, Turn};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a streamed completion over a snapshot of `history`
    async fn begin(&self, history: &ConversationHistory) -> Result<StreamHandle, ChatError>;

    /// Request the whole answer in one body
    async fn complete(&self, history: &ConversationHistory) -> Result<String, ChatError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for chat backends
pub struct LoggingBackend {
    inner: Arc<dyn ChatBackend>,
    model_id: String,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn ChatBackend>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }

    fn log_failure(&self, started: std::time::Instant, err: &ChatError, stream: bool) {
        tracing::error!(
            model = %self.model_id,
            duration_ms = %started.elapsed().as_millis(),
            stream,
            kind = ?err.kind,
            status = ?err.status,
            error = %err.message,
            retryable = err.is_retryable(),
            "Chat request failed"
        );
    }
}

#[async_trait]
impl ChatBackend for LoggingBackend {
    async fn begin(&self, history: &ConversationHistory) -> Result<StreamHandle, ChatError> {
        let started = std::time::Instant::now();
        let result = self.inner.begin(history).await;

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %started.elapsed().as_millis(),
                    turns = history.len(),
                    "Chat stream opened"
                );
            }
            Err(e) => self.log_failure(started, e, true),
        }

        result
    }

    async fn complete(&self, history: &ConversationHistory) -> Result<String, ChatError> {
        let started = std::time::Instant::now();
        let result = self.inner.complete(history).await;

        match &result {
            Ok(text) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %started.elapsed().as_millis(),
                    turns = history.len(),
                    chars = text.chars().count(),
                    "Chat request completed"
                );
            }
            Err(e) => self.log_failure(started, e, false),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
