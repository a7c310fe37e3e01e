//! Incremental transcript rendering
//!
//! Snapshots arrive after every change, but the terminal is append-only, so
//! [`Transcript`] remembers how much it has already printed and emits only
//! the difference.

use medchat_core::{ConversationSnapshot, ConversationStatus, MessageRole};

const ASSISTANT_PREFIX: &str = "assistant> ";
const RESET_BANNER: &str = "--- conversation ended ---\n";

/// Tracks what has been written to the terminal
#[derive(Debug, Default)]
pub struct Transcript {
    /// Generation of the conversation being shown
    generation: u64,
    /// Messages started so far
    shown: usize,
    /// Bytes printed of the last started message
    offset: usize,
    /// Whether the cursor sits at the end of an unfinished assistant line
    line_open: bool,
}

impl Transcript {
    /// Text to print to bring the terminal up to `snapshot`
    pub fn render(&mut self, snapshot: &ConversationSnapshot) -> String {
        let mut out = String::new();

        if snapshot.generation != self.generation {
            self.close_line(&mut out);
            out.push_str(RESET_BANNER);
            self.generation = snapshot.generation;
            self.shown = 0;
            self.offset = 0;
        }

        // Streaming appends only ever grow the last started message
        if let Some(last) = self.shown.checked_sub(1).and_then(|i| snapshot.messages.get(i)) {
            if let Some(delta) = last.content.get(self.offset..) {
                out.push_str(delta);
            }
            self.offset = last.content.len();
        }

        for message in snapshot.messages.iter().skip(self.shown) {
            self.close_line(&mut out);
            // User input is already on screen
            if message.role == MessageRole::Assistant {
                out.push_str(ASSISTANT_PREFIX);
                out.push_str(&message.content);
                self.line_open = true;
            }
            self.offset = message.content.len();
            self.shown += 1;
        }

        if snapshot.status == ConversationStatus::Idle {
            self.close_line(&mut out);
        }
        out
    }

    fn close_line(&mut self, out: &mut String) {
        if self.line_open {
            out.push('\n');
            self.line_open = false;
        }
    }
}
