//! Transport Layer
//!
//! Moves a submitted turn over the wire and folds the reply back into the
//! session.
//!
//! # Design Philosophy
//!
//! The driver ([`ChatTransport`]) knows the chat protocol: stream decoding,
//! the conversation-id sentinel, and how each outcome maps onto the state
//! machine. The endpoint ([`ChatEndpoint`]) only knows how to reach the
//! server. [`HttpEndpoint`] is the production endpoint.

mod driver;
mod http;
mod traits;

pub use driver::{ChatTransport, SendOutcome};
pub use http::HttpEndpoint;
pub use traits::{ByteStream, ChatEndpoint};
