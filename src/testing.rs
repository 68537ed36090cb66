//! Testing helpers and fakes.
//!
//! Provides an in-memory [`CacheStore`] with a manual clock and builders for
//! message payloads.

use crate::cache::{CacheError, CacheStore};
use crate::client::UserProfile;
use crate::message::{RawContent, RawMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct StoreState {
    now: Duration,
    entries: HashMap<String, (String, Option<Duration>)>,
}

/// In-memory key-value store honouring TTLs against a manual clock.
///
/// Time only moves through [`InMemoryStore::advance`], so expiry is
/// deterministic in tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// Move the store clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.now += by;
        }
    }

    /// Whether a live entry exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Stored value under `key`, ignoring expired entries.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        let (value, expires_at) = state.entries.get(key)?;
        match expires_at {
            Some(at) if *at <= state.now => None,
            _ => Some(value.clone()),
        }
    }

    /// Time left before `key` expires, `None` when absent or without expiry.
    #[must_use]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let state = self.state.lock().ok()?;
        let (_, expires_at) = state.entries.get(key)?;
        expires_at.and_then(|at| at.checked_sub(state.now))
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let expires_at = ttl.map(|ttl| state.now + ttl);
        state
            .entries
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.raw(key))
    }
}

/// Text message sent by user `7` at 2020-09-13 12:26:40 UTC.
#[must_use]
pub fn text_message(chat_id: i64, message_id: i64, text: &str) -> RawMessage {
    RawMessage {
        id: message_id,
        chat_id,
        sender_user_id: 7,
        date: 1_600_000_000,
        edit_date: 0,
        can_be_forwarded: true,
        content: Some(RawContent::text(text)),
    }
}

/// Media message of the given kind with an optional caption.
#[must_use]
pub fn media_message(
    chat_id: i64,
    message_id: i64,
    kind: &str,
    caption: Option<&str>,
) -> RawMessage {
    RawMessage {
        content: Some(RawContent::media(kind, caption.map(str::to_string))),
        ..text_message(chat_id, message_id, "")
    }
}

/// Profile of user `7`, Ada Lovelace (@ada).
#[must_use]
pub fn ada() -> UserProfile {
    UserProfile {
        id: 7,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        username: Some("ada".to_string()),
        phone_number: None,
    }
}
