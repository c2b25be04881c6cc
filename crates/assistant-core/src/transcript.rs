//! Append-only conversation store.

use crate::state::Message;

/// Greeting shown at the top of every new session.
pub const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today? \
You can also attach images and ask me about them!";

/// Ordered transcript of a session. Messages can only be appended.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// A transcript seeded with a single assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(greeting)],
        }
    }

    /// Append a message and return its index.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
