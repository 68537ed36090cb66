//! Message and user records.
//!
//! [`RawMessage`] is the payload shape exchanged with the chat client and stored
//! in the cache. [`normalize`] turns it into the canonical [`Message`] used by the
//! relay components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used when a message carries no extractable text or content type.
pub const NOT_AVAILABLE: &str = "n/a";

/// Text entity as delivered by the chat client (`{"text": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedText {
    /// Plain text body
    pub text: String,
}

impl FormattedText {
    /// Wrap a plain string.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Content section of a raw message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    /// Discriminant tag, e.g. `messageText`, `messagePhoto`, `messageChatAddMembers`
    #[serde(rename = "@type")]
    pub kind: String,
    /// Text body of text messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<FormattedText>,
    /// Caption of media messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<FormattedText>,
}

impl RawContent {
    /// Plain text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "messageText".to_string(),
            text: Some(FormattedText::new(text)),
            caption: None,
        }
    }

    /// Media content with an optional caption.
    #[must_use]
    pub fn media(kind: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            text: None,
            caption: caption.map(FormattedText::new),
        }
    }
}

const fn default_can_be_forwarded() -> bool {
    true
}

/// Message payload as observed from the chat client.
///
/// This is the value serialized into the cache, so field names are part of the
/// stored format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message id, unique within its chat
    pub id: i64,
    /// Chat the message belongs to
    pub chat_id: i64,
    /// Author id
    pub sender_user_id: i64,
    /// Send time, unix seconds
    pub date: i64,
    /// Last edit time, unix seconds; `0` when never edited
    pub edit_date: i64,
    /// Whether the platform allows forwarding this message
    #[serde(default = "default_can_be_forwarded")]
    pub can_be_forwarded: bool,
    /// Content section, absent for bare service payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<RawContent>,
}

/// Canonical message record derived from a [`RawMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message id
    pub message_id: i64,
    /// Chat id
    pub chat_id: i64,
    /// Author id
    pub author_id: i64,
    /// Content discriminant tag, [`NOT_AVAILABLE`] without content
    pub content_type: String,
    /// Extracted text, [`NOT_AVAILABLE`] when there is none
    pub content_text: String,
    /// Send time
    pub sent_at: DateTime<Utc>,
    /// Last edit time, `None` when never edited
    pub edited_at: Option<DateTime<Utc>>,
    /// The payload this record was derived from
    pub raw: RawMessage,
}

impl Message {
    /// Whether the content carries announceable text (`messageText` and friends).
    #[must_use]
    pub fn is_text_bearing(&self) -> bool {
        self.content_type.contains("Text")
    }

    /// Whether the content is a membership change (`messageChatAddMembers`, ...).
    #[must_use]
    pub fn is_membership_change(&self) -> bool {
        self.content_type.contains("Member")
    }

    /// Whether a text could be extracted.
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.content_text != NOT_AVAILABLE
    }

    /// Time of the latest version: the edit time, or the send time if never edited.
    #[must_use]
    pub fn last_changed_at(&self) -> DateTime<Utc> {
        self.edited_at.unwrap_or(self.sent_at)
    }
}

/// Extract the announceable text of a raw message.
///
/// Prefers the text body, falls back to the caption, and yields
/// [`NOT_AVAILABLE`] when neither exists or the result is blank.
#[must_use]
pub fn extract_text(raw: &RawMessage) -> String {
    let text = raw
        .content
        .as_ref()
        .and_then(|content| content.text.as_ref().or(content.caption.as_ref()))
        .map(|formatted| formatted.text.as_str())
        .unwrap_or_default();

    if text.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text.to_string()
    }
}

/// Convert a raw payload into a [`Message`].
///
/// Total for any deserialized payload: optional sections fall back to
/// [`NOT_AVAILABLE`] and out-of-range timestamps to the unix epoch.
///
/// # Examples
///
/// ```
/// use chat_audit_relay::message::{normalize, RawContent, RawMessage};
///
/// let raw = RawMessage {
///     id: 42,
///     chat_id: 100,
///     sender_user_id: 7,
///     date: 0,
///     edit_date: 0,
///     can_be_forwarded: true,
///     content: Some(RawContent::text("hello")),
/// };
/// let msg = normalize(&raw);
/// assert_eq!(msg.content_type, "messageText");
/// assert_eq!(msg.content_text, "hello");
/// ```
#[must_use]
pub fn normalize(raw: &RawMessage) -> Message {
    let content_type = raw
        .content
        .as_ref()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |content| content.kind.clone());

    Message {
        message_id: raw.id,
        chat_id: raw.chat_id,
        author_id: raw.sender_user_id,
        content_type,
        content_text: extract_text(raw),
        sent_at: timestamp(raw.date),
        edited_at: (raw.edit_date != 0).then(|| timestamp(raw.edit_date)),
        raw: raw.clone(),
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Display identity of a message author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id
    pub id: i64,
    /// First name
    pub first_name: String,
    /// Last name, empty when not set
    pub last_name: String,
    /// Public username without the leading `@`
    pub username: String,
    /// Phone number, when visible to the client
    pub phone_number: Option<String>,
}

impl User {
    /// `First Last [@username]`, skipping an empty last name.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full_name = [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        format!("{full_name} [@{}]", self.username)
    }
}
