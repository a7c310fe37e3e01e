//! Control-token splitting
//!
//! The endpoint appends the conversation id to the assistant text, behind a
//! sentinel. Everything before the first sentinel is visible content;
//! everything after it is control payload and is never shown.

use crate::error::ProtocolError;
use crate::messages::ConversationId;

/// Default sentinel that precedes the conversation id
pub const CONVERSATION_ID_SENTINEL: &str = "###CONVERSATION_ID###";

/// Most payload bytes kept after the sentinel; the rest is discarded
pub const MAX_ID_PAYLOAD: usize = 256;

/// Result of splitting decoded text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Split {
    /// Text to append to the open assistant message
    pub visible: String,
    /// Conversation id carried after the sentinel, if any
    pub id: Option<ConversationId>,
}

/// Parse the payload that follows the sentinel
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyConversationId`] if the payload is blank.
pub fn parse_conversation_id(payload: &str) -> Result<ConversationId, ProtocolError> {
    let id = payload.trim();
    if id.is_empty() {
        Err(ProtocolError::EmptyConversationId)
    } else {
        Ok(ConversationId::new(id))
    }
}

fn id_or_warn(payload: &str) -> Option<ConversationId> {
    match parse_conversation_id(payload) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed conversation id");
            None
        }
    }
}

/// Content before and payload after the first sentinel, if there is one
fn split_at_sentinel<'a>(text: &'a str, sentinel: &str) -> Option<(&'a str, &'a str)> {
    if sentinel.is_empty() {
        return None;
    }
    text.split_once(sentinel)
}

/// Split a single fragment at the first sentinel
///
/// This is what [`ControlTokenSplitter`] does for a stream that arrives in
/// one piece. It is stateless, so a sentinel cut in two by a fragment
/// boundary is not detected.
#[must_use]
pub fn split_fragment(fragment: &str, sentinel: &str) -> Split {
    match split_at_sentinel(fragment, sentinel) {
        Some((before, after)) => Split {
            visible: before.to_owned(),
            id: id_or_warn(after),
        },
        None => Split {
            visible: fragment.to_owned(),
            id: None,
        },
    }
}

/// Append `fragment` to `payload` without growing past [`MAX_ID_PAYLOAD`]
///
/// Returns `false` if anything had to be dropped.
fn append_capped(payload: &mut String, fragment: &str) -> bool {
    let room = MAX_ID_PAYLOAD.saturating_sub(payload.len());
    if fragment.len() <= room {
        payload.push_str(fragment);
        return true;
    }
    let mut end = room;
    while !fragment.is_char_boundary(end) {
        end -= 1;
    }
    payload.push_str(&fragment[..end]);
    false
}

#[derive(Debug)]
enum SplitterState {
    /// Before the sentinel; holds text that might be the start of it
    Content(String),
    /// After the sentinel; accumulates the id payload
    Payload {
        text: String,
        truncated: bool,
    },
}

/// Stream-aware sentinel splitter
///
/// Holds back the longest tail of the text seen so far that is a proper
/// prefix of the sentinel, so a sentinel split over several fragments is
/// still found. Once the sentinel is seen, every later fragment is payload,
/// kept up to [`MAX_ID_PAYLOAD`] bytes. The id is produced by
/// [`finish`](Self::finish) at end of stream, or read early with
/// [`pending_id`](Self::pending_id) when the stream breaks.
#[derive(Debug)]
pub struct ControlTokenSplitter {
    sentinel: String,
    state: SplitterState,
}

impl ControlTokenSplitter {
    /// Create a splitter for the given sentinel
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            state: SplitterState::Content(String::new()),
        }
    }

    /// Whether the sentinel has been seen
    #[must_use]
    pub fn saw_sentinel(&self) -> bool {
        matches!(self.state, SplitterState::Payload { .. })
    }

    /// The id received so far, if the sentinel and a non-blank payload were seen
    #[must_use]
    pub fn pending_id(&self) -> Option<ConversationId> {
        match &self.state {
            SplitterState::Payload { text, .. } => parse_conversation_id(text).ok(),
            SplitterState::Content(_) => None,
        }
    }

    /// Feed one decoded fragment, returning the text that is safe to show
    pub fn push(&mut self, fragment: &str) -> String {
        let held = match &mut self.state {
            SplitterState::Payload { text, truncated } => {
                if !*truncated && !append_capped(text, fragment) {
                    *truncated = true;
                    tracing::warn!(
                        limit = MAX_ID_PAYLOAD,
                        "Conversation id payload too long, discarding the rest"
                    );
                }
                return String::new();
            }
            SplitterState::Content(held) => std::mem::take(held),
        };

        if self.sentinel.is_empty() {
            return held + fragment;
        }

        let text = held + fragment;
        if let Some((before, after)) = split_at_sentinel(&text, &self.sentinel) {
            tracing::debug!("Conversation id sentinel found");
            let visible = before.to_owned();
            let mut payload = String::new();
            let truncated = !append_capped(&mut payload, after);
            if truncated {
                tracing::warn!(
                    limit = MAX_ID_PAYLOAD,
                    "Conversation id payload too long, discarding the rest"
                );
            }
            self.state = SplitterState::Payload {
                text: payload,
                truncated,
            };
            return visible;
        }

        let keep = partial_sentinel_len(&text, &self.sentinel);
        let (visible, held) = text.split_at(text.len() - keep);
        self.state = SplitterState::Content(held.to_owned());
        visible.to_owned()
    }

    /// End of stream
    ///
    /// Before the sentinel, any held-back text turns out to be content.
    /// After it, the trimmed payload is the conversation id.
    #[must_use]
    pub fn finish(self) -> Split {
        match self.state {
            SplitterState::Content(held) => Split {
                visible: held,
                id: None,
            },
            SplitterState::Payload { text, .. } => Split {
                visible: String::new(),
                id: id_or_warn(&text),
            },
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `sentinel`
fn partial_sentinel_len(text: &str, sentinel: &str) -> usize {
    let max = text.len().min(sentinel.len().saturating_sub(1));
    (1..=max)
        .rev()
        .find(|&len| sentinel.is_char_boundary(len) && text.ends_with(&sentinel[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(fragments: &[&str]) -> (String, Option<ConversationId>) {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        let mut visible = String::new();
        for fragment in fragments {
            visible.push_str(&splitter.push(fragment));
        }
        let tail = splitter.finish();
        visible.push_str(&tail.visible);
        (visible, tail.id)
    }

    #[test]
    fn test_split_fragment_without_sentinel() {
        let split = split_fragment("A fever is ", CONVERSATION_ID_SENTINEL);
        assert_eq!(split.visible, "A fever is ");
        assert_eq!(split.id, None);
    }

    #[test]
    fn test_split_fragment_with_sentinel() {
        let split = split_fragment("Hello###CONVERSATION_ID###abc123", CONVERSATION_ID_SENTINEL);
        assert_eq!(split.visible, "Hello");
        assert_eq!(split.id, Some(ConversationId::new("abc123")));
    }

    #[test]
    fn test_split_fragment_honors_first_sentinel_only() {
        let split = split_fragment(
            "Hi###CONVERSATION_ID### id-1 ###CONVERSATION_ID###id-2",
            CONVERSATION_ID_SENTINEL,
        );
        assert_eq!(split.visible, "Hi");
        assert_eq!(
            split.id,
            Some(ConversationId::new("id-1 ###CONVERSATION_ID###id-2"))
        );
    }

    #[test]
    fn test_split_fragment_blank_id_is_ignored() {
        let split = split_fragment("Bye###CONVERSATION_ID###   \n", CONVERSATION_ID_SENTINEL);
        assert_eq!(split.visible, "Bye");
        assert_eq!(split.id, None);
    }

    #[test]
    fn test_parse_conversation_id_trims() {
        assert_eq!(
            parse_conversation_id("  conv-42\n"),
            Ok(ConversationId::new("conv-42"))
        );
        assert_eq!(
            parse_conversation_id(" \t"),
            Err(ProtocolError::EmptyConversationId)
        );
    }

    #[test]
    fn test_splitter_plain_content() {
        let (visible, id) = run(&["A fever is ", "an elevated body temperature."]);
        assert_eq!(visible, "A fever is an elevated body temperature.");
        assert_eq!(id, None);
    }

    #[test]
    fn test_splitter_sentinel_in_one_fragment() {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        assert_eq!(splitter.push("Hello###CONVERSATION_ID###abc123"), "Hello");
        assert!(splitter.saw_sentinel());
        assert_eq!(
            splitter.finish(),
            Split {
                visible: String::new(),
                id: Some(ConversationId::new("abc123")),
            }
        );
    }

    #[test]
    fn test_splitter_id_in_following_fragment() {
        let (visible, id) = run(&[
            "A fever is ",
            "an elevated body temperature.",
            "###CONVERSATION_ID###",
            " conv-42",
        ]);
        assert_eq!(visible, "A fever is an elevated body temperature.");
        assert_eq!(id, Some(ConversationId::new("conv-42")));
    }

    #[test]
    fn test_splitter_sentinel_across_fragments() {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        assert_eq!(splitter.push("Rest well.###CONVER"), "Rest well.");
        assert!(!splitter.saw_sentinel());
        assert_eq!(splitter.push("SATION_ID###abc"), "");
        assert_eq!(splitter.push("123"), "");
        assert_eq!(splitter.finish().id, Some(ConversationId::new("abc123")));
    }

    #[test]
    fn test_splitter_releases_false_alarm() {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        assert_eq!(splitter.push("Item ##"), "Item ");
        assert_eq!(splitter.push("2 follows"), "##2 follows");
        assert_eq!(splitter.finish(), Split::default());
    }

    #[test]
    fn test_splitter_flushes_held_text_at_end() {
        let (visible, id) = run(&["Use a C#"]);
        assert_eq!(visible, "Use a C#");
        assert_eq!(id, None);
    }

    #[test]
    fn test_splitter_agrees_with_split_fragment() {
        for fragment in [
            "Hello###CONVERSATION_ID###abc123",
            "no marker here",
            "Bye###CONVERSATION_ID###  ",
        ] {
            let (visible, id) = run(&[fragment]);
            assert_eq!(
                Split { visible, id },
                split_fragment(fragment, CONVERSATION_ID_SENTINEL)
            );
        }
    }

    #[test]
    fn test_pending_id_before_end_of_stream() {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        splitter.push("Hi");
        assert_eq!(splitter.pending_id(), None);

        splitter.push("###CONVERSATION_ID###");
        assert_eq!(splitter.pending_id(), None);

        splitter.push(" abc123\n");
        assert_eq!(splitter.pending_id(), Some(ConversationId::new("abc123")));
    }

    #[test]
    fn test_payload_is_capped() {
        let mut splitter = ControlTokenSplitter::new(CONVERSATION_ID_SENTINEL);
        assert_eq!(splitter.push("ok###CONVERSATION_ID###"), "ok");
        for _ in 0..100 {
            assert_eq!(splitter.push("0123456789"), "");
        }

        let id = splitter.finish().id.unwrap();
        assert_eq!(id.as_str().len(), MAX_ID_PAYLOAD);
    }

    #[test]
    fn test_payload_cap_respects_char_boundaries() {
        let mut payload = "a".repeat(MAX_ID_PAYLOAD - 1);
        assert!(!append_capped(&mut payload, "é"));
        assert_eq!(payload.len(), MAX_ID_PAYLOAD - 1);

        let mut payload = String::new();
        assert!(append_capped(&mut payload, "conv-42"));
        assert_eq!(payload, "conv-42");
    }

    #[test]
    fn test_partial_sentinel_len() {
        assert_eq!(partial_sentinel_len("abc###CON", CONVERSATION_ID_SENTINEL), 6);
        assert_eq!(partial_sentinel_len("abc", CONVERSATION_ID_SENTINEL), 0);
        assert_eq!(partial_sentinel_len("#", CONVERSATION_ID_SENTINEL), 1);
        // A complete sentinel is never "partial"
        assert_eq!(partial_sentinel_len("ab", "ab"), 0);
    }
}
