//! Chat client port
//!
//! The relay talks to the messaging platform only through [`ChatClient`], so
//! the Telegram adapter, the retry decorator and test doubles are
//! interchangeable.

use crate::message::RawMessage;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by chat client calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request did not complete within the configured bound
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Transport failure before a response was received
    #[error("network error: {0}")]
    Network(String),
    /// The platform asked to slow down
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),
    /// The requested user or message does not exist or is not visible
    #[error("not found: {0}")]
    NotFound(String),
    /// An id cannot be represented on the platform
    #[error("invalid id: {0}")]
    InvalidId(i64),
    /// Any other error reported by the platform
    #[error("API error: {0}")]
    Api(String),
}

impl ClientError {
    /// Whether repeating the same request may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Network(_) | Self::RetryAfter(_)
        )
    }
}

/// Profile of a platform user as returned by the client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    /// User id
    pub id: i64,
    /// First name
    pub first_name: String,
    /// Last name, empty when not set
    pub last_name: String,
    /// Public username, `None` when the user has none
    pub username: Option<String>,
    /// Phone number, when visible
    pub phone_number: Option<String>,
}

/// Delivery options of a forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForwardOptions {
    /// Deliver silently
    pub disable_notification: bool,
    /// Prevent further forwarding of the copies
    pub protect_content: bool,
}

/// One forward request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    /// Destination chat
    pub to_chat: i64,
    /// Source chat
    pub from_chat: i64,
    /// Messages to forward, in order
    pub message_ids: Vec<i64>,
    /// Delivery options
    pub options: ForwardOptions,
    /// Forward all ids in one grouped call
    pub as_album: bool,
    /// Post copies without the forward header
    pub send_copy: bool,
    /// Drop media captions from copies
    pub remove_caption: bool,
}

impl ForwardRequest {
    /// Plain forward of a single message with default options
    #[must_use]
    pub fn single(from_chat: i64, to_chat: i64, message_id: i64) -> Self {
        Self {
            to_chat,
            from_chat,
            message_ids: vec![message_id],
            options: ForwardOptions::default(),
            as_album: false,
            send_copy: false,
            remove_caption: false,
        }
    }
}

/// Operations the relay needs from the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Authenticate and return the account's own profile
    async fn login(&self) -> Result<UserProfile, ClientError>;

    /// Fetch a user profile by id
    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ClientError>;

    /// Fetch the current version of a message, `None` when it is not known
    async fn get_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<RawMessage>, ClientError>;

    /// Send a plain text message (no parse mode)
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError>;

    /// Forward existing messages between chats
    async fn forward_messages(&self, request: &ForwardRequest) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ClientError::Network("reset".into()).is_transient());
        assert!(ClientError::RetryAfter(Duration::from_secs(3)).is_transient());
        assert!(!ClientError::NotFound("user".into()).is_transient());
        assert!(!ClientError::Api("Bad Request".into()).is_transient());
        assert!(!ClientError::InvalidId(-1).is_transient());
    }

    #[test]
    fn test_single_forward_defaults() {
        let req = ForwardRequest::single(-1001, -1002, 42);
        assert_eq!(req.from_chat, -1001);
        assert_eq!(req.to_chat, -1002);
        assert_eq!(req.message_ids, vec![42]);
        assert_eq!(req.options, ForwardOptions::default());
        assert!(!req.as_album && !req.send_copy && !req.remove_caption);
    }
}
