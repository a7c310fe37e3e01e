//! Shared Chat Session
//!
//! The presentation layer and the transport driver both need the
//! conversation: one to submit input and end conversations, the other to
//! fold streamed fragments in. [`ChatSession`] is the single owner. Every
//! operation runs under one short lock and publishes a fresh snapshot to
//! subscribers, so observers never see a half-applied fragment.
//!
//! A [`TurnHandle`] is what `submit` hands to the driver. It only mutates
//! the conversation while its turn is still current; once the turn has
//! completed, failed, or been cut off by `terminate`, it becomes inert.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::conversation::{
    Conversation, ConversationSettings, ConversationSnapshot, ConversationStatus, Turn,
};
use crate::messages::{ChatRequest, ConversationId};

struct Shared {
    conversation: Mutex<Conversation>,
    updates: watch::Sender<ConversationSnapshot>,
}

/// Cloneable handle to the one conversation of a client
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(ConversationSettings::default())
    }
}

impl ChatSession {
    /// Start a session with a fresh conversation
    #[must_use]
    pub fn new(settings: ConversationSettings) -> Self {
        let conversation = Conversation::new(settings);
        let (updates, _) = watch::channel(conversation.snapshot());
        Self {
            shared: Arc::new(Shared {
                conversation: Mutex::new(conversation),
                updates,
            }),
        }
    }

    /// Receive a snapshot after every change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.shared.conversation.lock().snapshot()
    }

    /// Conversation id, if one has been issued
    #[must_use]
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.shared.conversation.lock().id().cloned()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConversationStatus {
        self.shared.conversation.lock().status()
    }

    /// Submit user input; `None` if blank or a turn is already in flight
    #[must_use]
    pub fn submit(&self, text: &str) -> Option<TurnHandle> {
        let turn = self.update(|conversation| conversation.submit(text))?;
        tracing::info!(turn = turn.epoch(), "Submitted user message");
        Some(TurnHandle {
            session: self.clone(),
            turn,
        })
    }

    /// End the conversation locally; no-op without an id
    pub fn terminate(&self) -> bool {
        let terminated = self.update(Conversation::terminate);
        if terminated {
            tracing::info!("Conversation reset");
        }
        terminated
    }

    /// Run one operation under the lock and publish the result
    fn update<R>(&self, op: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut conversation = self.shared.conversation.lock();
        let revision = conversation.revision();
        let result = op(&mut *conversation);
        if conversation.revision() != revision {
            self.shared.updates.send_replace(conversation.snapshot());
        }
        result
    }

    /// Run an operation only if `turn` is still current
    fn update_turn(&self, turn: &Turn, op: impl FnOnce(&mut Conversation)) -> bool {
        self.update(|conversation| {
            if conversation.is_current(turn) {
                op(conversation);
                true
            } else {
                false
            }
        })
    }
}

/// Feeds one turn's response into the session
#[derive(Clone)]
pub struct TurnHandle {
    session: ChatSession,
    turn: Turn,
}

impl TurnHandle {
    /// Request body for the send endpoint
    #[must_use]
    pub fn request(&self) -> &ChatRequest {
        self.turn.request()
    }

    /// Turn number, for logging
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.turn.epoch()
    }

    /// Whether this turn is still the one streaming
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.session.shared.conversation.lock().is_current(&self.turn)
    }

    /// Append visible text; `false` once the turn is no longer current
    pub fn apply_fragment(&self, visible: &str) -> bool {
        self.session.update_turn(&self.turn, |conversation| {
            conversation.apply_fragment(visible);
        })
    }

    /// Record the conversation id; `false` once the turn is no longer current
    pub fn apply_id(&self, id: ConversationId) -> bool {
        self.session.update_turn(&self.turn, |conversation| {
            if !conversation.apply_id(id) {
                tracing::debug!("Conversation id already set, keeping the first");
            }
        })
    }

    /// Mark the response finished
    pub fn complete(&self) -> bool {
        self.session.update_turn(&self.turn, Conversation::complete)
    }

    /// Apply the end of the stream and complete, under one lock
    ///
    /// `false` if the turn was no longer current, in which case nothing is
    /// applied.
    pub fn finish(&self, visible: &str, id: Option<ConversationId>) -> bool {
        self.session.update_turn(&self.turn, |conversation| {
            conversation.apply_fragment(visible);
            if let Some(id) = id {
                if !conversation.apply_id(id) {
                    tracing::debug!("Conversation id already set, keeping the first");
                }
            }
            conversation.complete();
        })
    }

    /// Mark the response failed, appending the error message
    pub fn fail(&self) -> bool {
        self.session.update_turn(&self.turn, |conversation| {
            conversation.fail();
        })
    }
}
