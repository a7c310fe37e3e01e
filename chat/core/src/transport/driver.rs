//! Transport Driver
//!
//! Owns the read loop of one turn:
//!
//! 1. open the response stream (a rejection here fails the turn before any
//!    content was shown)
//! 2. decode chunks to text, split off the control token, apply each
//!    fragment to the session before asking for the next chunk
//! 3. at clean end of stream, apply the conversation id and complete
//!
//! Errors never escape: a failed turn is folded into the log by
//! `TurnHandle::fail` and reported back as [`SendOutcome::Failed`]. An id
//! that arrived in full before the failure is still recorded.

use std::pin::pin;

use futures::StreamExt;

use super::traits::ChatEndpoint;
use crate::error::TransportError;
use crate::session::{ChatSession, TurnHandle};
use crate::stream::{decode_utf8, ControlTokenSplitter, CONVERSATION_ID_SENTINEL};

/// How a turn ended
#[derive(Debug)]
pub enum SendOutcome {
    /// The stream ended cleanly and the turn is complete
    Completed,
    /// The turn failed; the error message has been appended to the log
    Failed(TransportError),
    /// The conversation was terminated while streaming; reading stopped
    Detached,
}

impl SendOutcome {
    /// Whether the turn completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Drives chat requests against an endpoint
pub struct ChatTransport<E: ChatEndpoint> {
    endpoint: E,
    sentinel: String,
}

impl<E: ChatEndpoint> ChatTransport<E> {
    /// Create a driver using the default sentinel
    pub fn new(endpoint: E) -> Self {
        Self::with_sentinel(endpoint, CONVERSATION_ID_SENTINEL)
    }

    /// Create a driver with a custom sentinel
    pub fn with_sentinel(endpoint: E, sentinel: impl Into<String>) -> Self {
        Self {
            endpoint,
            sentinel: sentinel.into(),
        }
    }

    /// The underlying endpoint
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Send a submitted turn and stream the reply into the session
    pub async fn send_message(&self, turn: &TurnHandle) -> SendOutcome {
        let epoch = turn.epoch();
        tracing::info!(
            turn = epoch,
            endpoint = self.endpoint.name(),
            conversation_id = ?turn.request().conversation_id,
            "Sending message"
        );

        let chunks = match self.endpoint.open_stream(turn.request()).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(turn = epoch, error = %e, "Chat request rejected");
                turn.fail();
                return SendOutcome::Failed(e);
            }
        };

        let mut splitter = ControlTokenSplitter::new(self.sentinel.as_str());
        let mut fragments = pin!(decode_utf8(chunks));

        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    tracing::trace!(turn = epoch, bytes = text.len(), "Fragment received");
                    let visible = splitter.push(&text);
                    if !turn.apply_fragment(&visible) {
                        tracing::info!(turn = epoch, "Turn superseded, dropping stream");
                        return SendOutcome::Detached;
                    }
                }
                Err(e) => {
                    // Held-back text may be half a sentinel; drop it with the turn
                    tracing::warn!(turn = epoch, error = %e, "Chat stream interrupted");
                    if let Some(id) = splitter.pending_id() {
                        tracing::info!(
                            turn = epoch,
                            conversation_id = %id,
                            "Conversation id received before interruption"
                        );
                        turn.apply_id(id);
                    }
                    turn.fail();
                    return SendOutcome::Failed(e);
                }
            }
        }

        let tail = splitter.finish();
        if let Some(ref id) = tail.id {
            tracing::info!(turn = epoch, conversation_id = %id, "Conversation id received");
        }
        if !turn.finish(&tail.visible, tail.id) {
            tracing::info!(turn = epoch, "Turn superseded before completion");
            return SendOutcome::Detached;
        }

        tracing::info!(turn = epoch, "Response complete");
        SendOutcome::Completed
    }

    /// Ask the server to end the conversation, then reset the session
    ///
    /// Returns `Ok(false)` without any request if no conversation id has been
    /// issued yet.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the server could not be reached or
    /// refused; the session is left untouched in that case.
    pub async fn end_conversation(&self, session: &ChatSession) -> Result<bool, TransportError> {
        let Some(id) = session.conversation_id() else {
            tracing::debug!("No conversation to end");
            return Ok(false);
        };

        if let Err(e) = self.endpoint.end_conversation(&id).await {
            tracing::warn!(conversation_id = %id, error = %e, "Failed to end conversation");
            return Err(e);
        }

        tracing::info!(conversation_id = %id, "Conversation ended");
        Ok(session.terminate())
    }
}
