//! MedChat Core - Streaming Chat Client Logic
//!
//! This crate holds everything a chat front end needs except the front end:
//! the conversation state machine, the stream decoding pipeline, and the
//! transport that ties them to the assistant server. A terminal UI, a web
//! view, or a test harness can sit on top of it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Presentation Layer                         │
//! │        (observes snapshots, submits input, ends chats)        │
//! └──────────────┬────────────────────────────▲──────────────────┘
//!                │ send / end_conversation    │ watch::Receiver
//! ┌──────────────▼────────────────────────────┴──────────────────┐
//! │                         ChatClient                            │
//! │  ┌─────────────────────┐          ┌────────────────────────┐ │
//! │  │    ChatTransport    │──turn───▶│      ChatSession       │ │
//! │  │ decode ▶ split ▶ ⋯  │          │  Conversation (state)  │ │
//! │  └──────────┬──────────┘          └────────────────────────┘ │
//! └─────────────┼────────────────────────────────────────────────┘
//!               │ ChatEndpoint
//!        ┌──────▼──────┐
//!        │HttpEndpoint │──▶ POST /api/chat, POST /api/chat/end
//!        └─────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatClient`]: Session plus transport, the usual entry point
//! - [`ChatSession`]: Shared owner of the conversation, publishes snapshots
//! - [`Conversation`]: The state machine itself
//! - [`ChatTransport`]: Streams one turn's reply into the session
//! - [`ChatEndpoint`]: Seam between the driver and the server
//!
//! # Quick Start
//!
//! ```ignore
//! use medchat_core::{config, ChatClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     let client = ChatClient::from_config(&config)?;
//!
//!     client.send("What is a fever?").await;
//!     for message in client.session().snapshot().messages {
//!         println!("{}: {}", message.role, message.content);
//!     }
//!
//!     client.end_conversation().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`client`]: Session and transport joined together
//! - [`config`]: TOML, environment and CLI configuration
//! - [`conversation`]: Conversation state machine
//! - [`error`]: Error types
//! - [`messages`]: Wire types
//! - [`session`]: Shared, observable conversation
//! - [`stream`]: UTF-8 decoding and control-token splitting
//! - [`transport`]: Endpoint trait, HTTP endpoint, and the driver

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod session;
pub mod stream;
pub mod transport;

pub use client::ChatClient;
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use conversation::{
    Conversation, ConversationSettings, ConversationSnapshot, ConversationStatus, Turn,
};
pub use error::{DecodeError, ProtocolError, TransportError};
pub use messages::{ChatMessage, ChatRequest, ConversationId, EndConversationRequest, MessageRole};
pub use session::{ChatSession, TurnHandle};
pub use transport::{ChatEndpoint, ChatTransport, HttpEndpoint, SendOutcome};
