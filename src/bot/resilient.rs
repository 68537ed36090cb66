//! Timeout and retry decorator for chat clients.
//!
//! Every call is bounded by the request timeout. Transient failures are
//! retried with a jittered fixed backoff using `tokio-retry`. Reads retry on
//! timeouts too; writes do not, since a timed out send may still have been
//! delivered.
//!
//! # Usage
//!
//! ```ignore
//! use chat_audit_relay::bot::resilient::ResilientClient;
//!
//! let client = ResilientClient::from_settings(telegram, &settings.client);
//! client.send_message(chat_id, "Hello!").await?;
//! ```

use crate::client::{ChatClient, ClientError, ForwardRequest, UserProfile};
use crate::config::ClientSettings;
use crate::message::RawMessage;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, FixedInterval};
use tokio_retry::RetryIf;
use tracing::warn;

/// Which failures a call may be repeated after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    /// Reads: any transient error
    Idempotent,
    /// Writes: only failures that guarantee nothing was delivered
    Write,
}

impl RetryPolicy {
    const fn should_retry(self, error: &ClientError) -> bool {
        match self {
            Self::Idempotent => error.is_transient(),
            Self::Write => matches!(error, ClientError::Network(_) | ClientError::RetryAfter(_)),
        }
    }
}

/// [`ChatClient`] wrapper bounding and retrying every call
pub struct ResilientClient {
    inner: Arc<dyn ChatClient>,
    timeout: Duration,
    max_retries: usize,
    backoff: Duration,
}

impl ResilientClient {
    /// Wrap `inner` with an explicit policy
    #[must_use]
    pub fn new(
        inner: Arc<dyn ChatClient>,
        timeout: Duration,
        max_retries: usize,
        backoff: Duration,
    ) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
            backoff,
        }
    }

    /// Wrap `inner` with the configured policy
    #[must_use]
    pub fn from_settings(inner: Arc<dyn ChatClient>, settings: &ClientSettings) -> Self {
        Self::new(
            inner,
            settings.request_timeout(),
            settings.max_retries,
            settings.retry_backoff(),
        )
    }

    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        policy: RetryPolicy,
        mut action: F,
    ) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let timeout = self.timeout;
        let strategy = FixedInterval::new(self.backoff)
            .map(jitter)
            .take(self.max_retries);

        let result = RetryIf::spawn(
            strategy,
            || {
                let request = action();
                async move {
                    match tokio::time::timeout(timeout, request).await {
                        Ok(Err(ClientError::RetryAfter(wait))) => {
                            // Honour the server's cool-down before the next attempt
                            tokio::time::sleep(wait.min(timeout)).await;
                            Err(ClientError::RetryAfter(wait))
                        }
                        Ok(result) => result,
                        Err(_) => Err(ClientError::Timeout(timeout)),
                    }
                }
            },
            |e: &ClientError| policy.should_retry(e),
        )
        .await;

        if let Err(e) = &result {
            warn!(operation, "Chat client call failed: {e}");
        }
        result
    }
}

#[async_trait]
impl ChatClient for ResilientClient {
    async fn login(&self) -> Result<UserProfile, ClientError> {
        self.call("login", RetryPolicy::Idempotent, || self.inner.login())
            .await
    }

    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ClientError> {
        self.call("get_user", RetryPolicy::Idempotent, || {
            self.inner.get_user(user_id)
        })
        .await
    }

    async fn get_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<RawMessage>, ClientError> {
        self.call("get_message", RetryPolicy::Idempotent, || {
            self.inner.get_message(chat_id, message_id)
        })
        .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError> {
        self.call("send_message", RetryPolicy::Write, || {
            self.inner.send_message(chat_id, text)
        })
        .await
    }

    async fn forward_messages(&self, request: &ForwardRequest) -> Result<(), ClientError> {
        self.call("forward_messages", RetryPolicy::Write, || {
            self.inner.forward_messages(request)
        })
        .await
    }
}
