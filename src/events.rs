//! Typed events delivered by the transport to the relay.

use crate::message::RawMessage;

/// One inbound event, carrying only the fields its kind guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message appeared in a chat the account can see.
    NewMessage(RawMessage),
    /// A batch of messages was deleted from one chat.
    MessagesDeleted {
        /// Chat the messages were deleted from
        chat_id: i64,
        /// Ids of the deleted messages
        message_ids: Vec<i64>,
        /// Set when the deletion only reflects local cache eviction on the client
        from_cache: bool,
    },
    /// A message was edited; the new version has to be fetched by id.
    MessageEdited {
        /// Chat of the edited message
        chat_id: i64,
        /// Id of the edited message
        message_id: i64,
    },
}

impl ChatEvent {
    /// Chat the event refers to.
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        match self {
            Self::NewMessage(raw) => raw.chat_id,
            Self::MessagesDeleted { chat_id, .. } | Self::MessageEdited { chat_id, .. } => {
                *chat_id
            }
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessagesDeleted { .. } => "messages_deleted",
            Self::MessageEdited { .. } => "message_edited",
        }
    }
}
