//! Conversation State Machine
//!
//! Owns the message log, the server-issued conversation id, and whether a
//! response is currently streaming in.
//!
//! # States
//!
//! ```text
//!            submit                      complete / fail
//!   Idle ───────────────▶ Sending ───────────────────────▶ Idle
//!    ▲                       │
//!    └───── terminate ───────┘   (terminate needs an id; works in either state)
//! ```
//!
//! Only the most recent assistant message is ever open for appending, and
//! only while `Sending`. Everything before it is frozen.

use serde::{Deserialize, Serialize};

use crate::messages::{ChatMessage, ChatRequest, ConversationId};

/// Greeting shown when the client starts
pub const DEFAULT_GREETING: &str = "Hi, thank you for connecting with SmartHealth. I'm your medical assistant. How can I help you today?";

/// Greeting shown after a conversation has been ended
pub const DEFAULT_RESET_GREETING: &str = "Hello. How are you feeling today?";

/// Message appended when a response could not be received
pub const DEFAULT_ERROR_MESSAGE: &str =
    "I'm sorry, but I encountered an error. Please try again later.";

/// Fixed texts the state machine writes into the log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSettings {
    /// First message of a new client
    pub greeting: String,
    /// First message after `terminate`
    pub reset_greeting: String,
    /// Appended by `fail`
    pub error_message: String,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            reset_greeting: DEFAULT_RESET_GREETING.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Whether a response is in flight
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationStatus {
    /// Ready for input
    #[default]
    Idle,
    /// A response stream is being read
    Sending,
}

/// A submitted turn waiting for its response
///
/// Carries the request to send and the epoch it belongs to. Updates for a
/// turn whose epoch is no longer current are discarded.
#[derive(Clone, Debug)]
pub struct Turn {
    epoch: u64,
    request: ChatRequest,
}

impl Turn {
    /// Epoch of the conversation when this turn was submitted
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Request body for the send endpoint
    #[must_use]
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

/// Immutable copy of the observable state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    /// Conversation id, once the server has issued one
    pub id: Option<ConversationId>,
    /// Message log in insertion order
    pub messages: Vec<ChatMessage>,
    /// Current status
    pub status: ConversationStatus,
    /// Bumped on every change
    pub revision: u64,
    /// Bumped on every termination
    pub generation: u64,
}

/// The conversation state machine
#[derive(Debug)]
pub struct Conversation {
    settings: ConversationSettings,
    id: Option<ConversationId>,
    messages: Vec<ChatMessage>,
    status: ConversationStatus,
    /// Index of the message open for appending
    open: Option<usize>,
    /// Advanced by `submit` and `terminate`
    epoch: u64,
    revision: u64,
    generation: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ConversationSettings::default())
    }
}

impl Conversation {
    /// Create a conversation holding only the greeting
    #[must_use]
    pub fn new(settings: ConversationSettings) -> Self {
        let messages = vec![ChatMessage::assistant(settings.greeting.clone())];
        Self {
            settings,
            id: None,
            messages,
            status: ConversationStatus::Idle,
            open: None,
            epoch: 0,
            revision: 0,
            generation: 0,
        }
    }

    /// Conversation id, if one has been issued
    #[must_use]
    pub fn id(&self) -> Option<&ConversationId> {
        self.id.as_ref()
    }

    /// Message log
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    /// Whether a response is in flight
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.status == ConversationStatus::Sending
    }

    /// Change counter
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Fixed texts in use
    #[must_use]
    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Copy of the observable state
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            id: self.id.clone(),
            messages: self.messages.clone(),
            status: self.status,
            revision: self.revision,
            generation: self.generation,
        }
    }

    /// Whether `turn` is the one currently streaming
    #[must_use]
    pub fn is_current(&self, turn: &Turn) -> bool {
        self.is_sending() && self.epoch == turn.epoch
    }

    /// Submit user input
    ///
    /// Returns `None` and changes nothing if `text` is blank or a response is
    /// already in flight. Otherwise appends the user message and an empty
    /// assistant message, switches to `Sending`, and returns the turn.
    pub fn submit(&mut self, text: &str) -> Option<Turn> {
        if text.trim().is_empty() || self.is_sending() {
            return None;
        }

        let user = ChatMessage::user(text);
        let mut history = self.messages.clone();
        history.push(user.clone());

        self.messages.push(user);
        self.messages.push(ChatMessage::assistant(String::new()));
        self.open = Some(self.messages.len() - 1);
        self.status = ConversationStatus::Sending;
        self.epoch += 1;
        self.touch();

        Some(Turn {
            epoch: self.epoch,
            request: ChatRequest {
                messages: history,
                conversation_id: self.id.clone(),
            },
        })
    }

    /// Append visible text to the open assistant message
    ///
    /// Returns `false` if nothing was appended.
    pub fn apply_fragment(&mut self, visible: &str) -> bool {
        if visible.is_empty() {
            return false;
        }
        let Some(message) = self.open.and_then(|index| self.messages.get_mut(index)) else {
            return false;
        };
        message.content.push_str(visible);
        self.touch();
        true
    }

    /// Record the conversation id; the first one wins
    pub fn apply_id(&mut self, id: ConversationId) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id);
        self.touch();
        true
    }

    /// The response finished
    pub fn complete(&mut self) {
        self.open = None;
        if self.is_sending() {
            self.status = ConversationStatus::Idle;
            self.touch();
        }
    }

    /// The response could not be received
    ///
    /// Keeps whatever partial content arrived and appends the error message
    /// after it. No-op when idle.
    pub fn fail(&mut self) -> bool {
        if !self.is_sending() {
            return false;
        }
        self.open = None;
        self.messages
            .push(ChatMessage::assistant(self.settings.error_message.clone()));
        self.status = ConversationStatus::Idle;
        self.touch();
        true
    }

    /// End the conversation
    ///
    /// Only has an effect once an id has been issued. Resets the log to the
    /// reset greeting, clears the id and returns to `Idle`, even mid-stream.
    pub fn terminate(&mut self) -> bool {
        if self.id.is_none() {
            return false;
        }
        self.messages = vec![ChatMessage::assistant(self.settings.reset_greeting.clone())];
        self.id = None;
        self.open = None;
        self.status = ConversationStatus::Idle;
        self.epoch += 1;
        self.generation += 1;
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
