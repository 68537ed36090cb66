//! Mirrors new messages of one chat into another by forwarding them.

use super::{EventHandler, RelayContext, RelayError};
use crate::client::{ChatClient, ForwardRequest};
use crate::config::ForwardRoute;
use crate::events::ChatEvent;
use crate::logging::Mode;
use crate::message::{extract_text, RawMessage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Forwards every new message of the source chat to the destination chat
pub struct Forwarder {
    client: Arc<dyn ChatClient>,
    route: ForwardRoute,
}

impl Forwarder {
    /// Create a forwarder for `route`
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>, route: ForwardRoute) -> Self {
        Self { client, route }
    }

    /// Forwarder from the settings, `None` when disabled or without a route
    #[must_use]
    pub fn from_context(ctx: &RelayContext) -> Option<Self> {
        let settings = &ctx.settings.forwarder;
        if !settings.enable {
            return None;
        }
        Some(Self::new(ctx.client.clone(), settings.route()?))
    }

    /// Forward `raw` if it belongs to the source chat and may be forwarded
    pub async fn on_new_message(&self, raw: &RawMessage) {
        if raw.chat_id != self.route.from_chat {
            return;
        }

        let text = extract_text(raw);
        info!(message_id = raw.id, date = raw.date, "Found message: '{text}'");

        if !raw.can_be_forwarded {
            warn!("Found message, but can't forward message #{} ('{text}')", raw.id);
            return;
        }

        let request = ForwardRequest::single(raw.chat_id, self.route.to_chat, raw.id);
        match self.client.forward_messages(&request).await {
            Ok(()) => info!(
                message_id = raw.id,
                to_chat = self.route.to_chat,
                "Message forwarded"
            ),
            Err(e) => error!(message_id = raw.id, "Failed to forward message: {e}"),
        }
    }
}

#[async_trait]
impl EventHandler for Forwarder {
    fn mode(&self) -> Mode {
        Mode::Forward
    }

    async fn handle(&self, event: &ChatEvent) -> Result<(), RelayError> {
        if let ChatEvent::NewMessage(raw) = event {
            self.on_new_message(raw).await;
        }
        Ok(())
    }
}
