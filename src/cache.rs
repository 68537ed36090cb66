//! Message snapshot cache
//!
//! Stores the latest observed version of each monitored message in Redis so
//! deletions and edits can be reported after the fact.

use crate::config::RedisSettings;
use crate::message::RawMessage;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Prefix of audit copies written for deleted messages
pub const DELETED_PREFIX: &str = "deleted-";

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Error reported by the Redis server or connection
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Error of a non-Redis store
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Interface for key-value stores holding serialized snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Probe connectivity
    async fn ping(&self) -> Result<(), CacheError>;
    /// Store `value` under `key`, replacing any previous value and expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), CacheError>;
    /// Fetch the value under `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with `PING`
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the server is unreachable
    /// or it does not answer the ping.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.connection_info())?;
        let conn = client.get_connection_manager().await?;
        let store = Self { conn };
        store.ping().await?;
        info!(
            "Redis connected at {}:{} (db {})",
            settings.host, settings.port, settings.db
        );
        Ok(store)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // SET .. EX replaces value and expiry in one step
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }
}

/// Key of a cached snapshot: `{chat_id}-{message_id}`
#[must_use]
pub fn message_key(chat_id: i64, message_id: i64) -> String {
    format!("{chat_id}-{message_id}")
}

/// Key of an audit copy: `deleted-{chat_id}-{message_id}`
#[must_use]
pub fn deleted_key(chat_id: i64, message_id: i64) -> String {
    format!("{DELETED_PREFIX}{}", message_key(chat_id, message_id))
}

/// Snapshot cache over any [`CacheStore`]
#[derive(Clone)]
pub struct MessageCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    deleted_ttl: Option<Duration>,
}

impl MessageCache {
    /// Create a cache writing snapshots with `ttl` and audit copies with `deleted_ttl`
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, deleted_ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            deleted_ttl,
        }
    }

    /// Create a cache from the detector's Redis settings
    #[must_use]
    pub fn from_settings(store: Arc<dyn CacheStore>, settings: &RedisSettings) -> Self {
        Self::new(store, settings.message_ttl(), settings.deleted_ttl())
    }

    /// Store the latest snapshot of a message, restarting its TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn put(
        &self,
        chat_id: i64,
        message_id: i64,
        payload: &RawMessage,
    ) -> Result<(), CacheError> {
        let key = message_key(chat_id, message_id);
        let body = serde_json::to_string(payload)?;
        self.store.set(&key, &body, Some(self.ttl)).await?;
        debug!("Cached {key} for {}s", self.ttl.as_secs());
        Ok(())
    }

    /// Fetch the cached snapshot of a message
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the stored value is not a
    /// valid snapshot.
    pub async fn get(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<RawMessage>, CacheError> {
        let key = message_key(chat_id, message_id);
        match self.store.get(&key).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Write the audit copy of a deleted message
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn put_deleted(
        &self,
        chat_id: i64,
        message_id: i64,
        payload: &RawMessage,
    ) -> Result<(), CacheError> {
        let key = deleted_key(chat_id, message_id);
        let body = serde_json::to_string(payload)?;
        self.store.set(&key, &body, self.deleted_ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{text_message, InMemoryStore};
    use mockall::predicate::*;

    const TTL: Duration = Duration::from_secs(604_800);

    #[test]
    fn test_keys() {
        assert_eq!(message_key(-100, 42), "-100-42");
        assert_eq!(deleted_key(100, 42), "deleted-100-42");
    }

    #[tokio::test]
    async fn test_put_then_get() -> Result<(), CacheError> {
        let store = Arc::new(InMemoryStore::default());
        let cache = MessageCache::new(store.clone(), TTL, None);
        let raw = text_message(100, 42, "hello");

        cache.put(100, 42, &raw).await?;

        assert_eq!(cache.get(100, 42).await?, Some(raw));
        assert_eq!(cache.get(100, 43).await?, None);
        assert!(store.contains("100-42"));
        Ok(())
    }

    #[tokio::test]
    async fn test_put_twice_resets_ttl() -> Result<(), CacheError> {
        let store = Arc::new(InMemoryStore::default());
        let cache = MessageCache::new(store.clone(), TTL, None);
        let raw = text_message(100, 42, "hello");

        cache.put(100, 42, &raw).await?;
        store.advance(Duration::from_secs(3_600));
        let remaining = store.ttl_remaining("100-42");
        cache.put(100, 42, &raw).await?;

        assert_eq!(cache.get(100, 42).await?, Some(raw));
        assert_eq!(store.ttl_remaining("100-42"), Some(TTL));
        assert!(remaining < Some(TTL));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() -> Result<(), CacheError> {
        let store = Arc::new(InMemoryStore::default());
        let cache = MessageCache::new(store.clone(), Duration::from_secs(10), None);
        cache.put(1, 2, &text_message(1, 2, "x")).await?;

        store.advance(Duration::from_secs(11));

        assert_eq!(cache.get(1, 2).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_copy_uses_audit_ttl() -> Result<(), CacheError> {
        let raw = text_message(100, 42, "hello");
        let body = serde_json::to_string(&raw)?;

        let mut mock = MockCacheStore::new();
        mock.expect_set()
            .with(eq("deleted-100-42"), eq(body), eq(None::<Duration>))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let cache = MessageCache::new(Arc::new(mock), TTL, None);
        cache.put_deleted(100, 42, &raw).await
    }

    #[tokio::test]
    async fn test_zero_audit_ttl_keeps_copies() -> Result<(), CacheError> {
        let settings = RedisSettings {
            deleted_ttl: Some(0),
            ..RedisSettings::default()
        };
        let store = Arc::new(InMemoryStore::default());
        let cache = MessageCache::from_settings(store.clone(), &settings);

        cache.put_deleted(100, 42, &text_message(100, 42, "gone")).await?;
        store.advance(Duration::from_secs(3_600));

        assert!(store.contains("deleted-100-42"));
        assert_eq!(store.ttl_remaining("deleted-100-42"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let mut mock = MockCacheStore::new();
        mock.expect_get()
            .returning(|_| Ok(Some("not json".to_string())));

        let cache = MessageCache::new(Arc::new(mock), TTL, None);
        let result = cache.get(1, 1).await;
        assert!(matches!(result, Err(CacheError::Json(_))));
    }
}
