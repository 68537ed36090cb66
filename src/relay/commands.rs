//! Debug command: logs the ids of the chat it was sent in.

use super::{EventHandler, RelayError};
use crate::events::ChatEvent;
use crate::logging::Mode;
use crate::message::extract_text;
use async_trait::async_trait;
use tracing::info;

/// Logs chat and message ids of messages whose text equals the command
pub struct CommandListener {
    command: String,
}

impl CommandListener {
    /// Listen for the literal `command`
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Whether `text` triggers the command
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        text == self.command
    }

    /// Chat and message id of a new message carrying the command
    #[must_use]
    pub fn requested(&self, event: &ChatEvent) -> Option<(i64, i64)> {
        match event {
            ChatEvent::NewMessage(raw) if self.matches(&extract_text(raw)) => {
                Some((raw.chat_id, raw.id))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl EventHandler for CommandListener {
    fn mode(&self) -> Mode {
        Mode::Debug
    }

    async fn handle(&self, event: &ChatEvent) -> Result<(), RelayError> {
        if let Some((chat_id, message_id)) = self.requested(event) {
            info!(chat_id, message_id, "Chat id requested");
        }
        Ok(())
    }
}
