//! Chat error types

use thiserror::Error;

/// Chat error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// HTTP status, when the server answered at all
    pub status: Option<u16>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Connection, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Auth, message)
    }

    pub fn unexpected_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::UnexpectedStatus, message).with_status(status)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Timeout, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Config, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Decode, message)
    }

    /// Whether a caller-side retry policy may try again
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ChatErrorKind::UnexpectedStatus => {
                matches!(self.status, Some(429 | 500..=599))
            }
            kind => kind.is_retryable(),
        }
    }

    /// Short annotation shown next to partial text
    pub fn diagnostic(&self) -> &'static str {
        match self.kind {
            ChatErrorKind::Connection => "⚠️ Could not reach the assistant.",
            ChatErrorKind::Auth => "⚠️ The assistant rejected the API key.",
            ChatErrorKind::UnexpectedStatus | ChatErrorKind::Decode => {
                "⚠️ Error fetching response."
            }
            ChatErrorKind::Transport => "⚠️ The response was cut off.",
            ChatErrorKind::Timeout => "⚠️ The assistant stopped responding.",
            ChatErrorKind::Config => "⚠️ The assistant is not configured.",
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Endpoint unreachable, TLS/HTTP handshake failed
    Connection,
    /// Rejected credentials (401, 403) before streaming began
    Auth,
    /// Any other non-success initial status
    UnexpectedStatus,
    /// Connection dropped mid-stream
    Transport,
    /// No data within the read timeout
    Timeout,
    /// Client could not be constructed
    Config,
    /// Non-streaming body was not a chat completion
    Decode,
}

impl ChatErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Connection | Self::Transport | Self::Timeout)
    }
}
