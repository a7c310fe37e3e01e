//! Stream Decoding
//!
//! Turns the raw response body into visible text plus an optional
//! conversation id.
//!
//! ```text
//!  bytes ──▶ Utf8StreamDecoder ──▶ fragments ──▶ ControlTokenSplitter ──▶ visible text
//!                                                        │
//!                                                        └──▶ conversation id (end of stream)
//! ```
//!
//! The decoder never splits a multi-byte character across fragments. The
//! splitter never lets sentinel bytes, or anything after them, through as
//! visible text, even when the sentinel straddles two fragments.

mod decoder;
mod splitter;

pub use decoder::{decode_utf8, Utf8StreamDecoder};
pub use splitter::{
    parse_conversation_id, split_fragment, ControlTokenSplitter, Split, CONVERSATION_ID_SENTINEL,
    MAX_ID_PAYLOAD,
};
