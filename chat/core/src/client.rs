//! Chat Client
//!
//! Joins a [`ChatSession`] with a [`ChatTransport`]. This is what a
//! presentation layer holds: it submits and sends in one call, ends the
//! conversation, and exposes the session for observation.

use crate::config::ClientConfig;
use crate::conversation::ConversationSettings;
use crate::error::TransportError;
use crate::session::ChatSession;
use crate::transport::{ChatEndpoint, ChatTransport, HttpEndpoint, SendOutcome};

/// One conversation against one endpoint
pub struct ChatClient<E: ChatEndpoint> {
    session: ChatSession,
    transport: ChatTransport<E>,
}

impl ChatClient<HttpEndpoint> {
    /// Build an HTTP client from loaded configuration
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = HttpEndpoint::new(config.endpoint.clone())?;
        Ok(Self::new(
            endpoint,
            config.conversation.clone(),
            config.sentinel.as_str(),
        ))
    }
}

impl<E: ChatEndpoint> ChatClient<E> {
    /// Create a client with a fresh conversation
    pub fn new(endpoint: E, settings: ConversationSettings, sentinel: &str) -> Self {
        Self {
            session: ChatSession::new(settings),
            transport: ChatTransport::with_sentinel(endpoint, sentinel),
        }
    }

    /// The session, for snapshots and subscriptions
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// The transport driver
    pub fn transport(&self) -> &ChatTransport<E> {
        &self.transport
    }

    /// Submit `text` and stream the reply
    ///
    /// Returns `None` when the submission was ignored (blank input, or a
    /// response is still streaming).
    pub async fn send(&self, text: &str) -> Option<SendOutcome> {
        let turn = self.session.submit(text)?;
        Some(self.transport.send_message(&turn).await)
    }

    /// End the current conversation on the server and locally
    ///
    /// # Errors
    ///
    /// Returns the transport error if the server call failed; the
    /// conversation is unchanged in that case.
    pub async fn end_conversation(&self) -> Result<bool, TransportError> {
        self.transport.end_conversation(&self.session).await
    }
}
