//! Chat Endpoint Traits
//!
//! The driver only needs two things from the server: a byte stream for a
//! chat request, and an acknowledgement for ending a conversation. Keeping
//! that behind a trait lets the driver run against HTTP in production and
//! against scripted streams in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::messages::{ChatRequest, ConversationId};

/// Raw response body, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Server side of the chat protocol
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Endpoint name for logs
    fn name(&self) -> &str;

    /// Send the request and return the response body as a stream
    ///
    /// Must fail with [`TransportError`] if the server rejects the request
    /// before any body bytes are available.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    /// Ask the server to end the conversation
    async fn end_conversation(&self, id: &ConversationId) -> Result<(), TransportError>;
}
