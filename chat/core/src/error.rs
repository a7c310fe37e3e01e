//! Error Types
//!
//! Only [`TransportError`] ever reaches a caller. [`DecodeError`] and
//! [`ProtocolError`] are recovered where they happen and logged.

use thiserror::Error;

/// Failure talking to the chat endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be built, sent, or read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status before any content
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The response stream broke after it started
    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

impl TransportError {
    /// Whether the endpoint rejected the request outright
    #[must_use]
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Malformed UTF-8 left over at the end of a stream
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream ended in the middle of a multi-byte character
    #[error("stream ended with {bytes} byte(s) of an incomplete UTF-8 sequence")]
    IncompleteTail {
        /// Number of bytes dropped
        bytes: usize,
    },
}

/// Malformed control payload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The sentinel was present but nothing followed it
    #[error("conversation id is empty")]
    EmptyConversationId,
}
