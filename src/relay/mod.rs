//! Event relay
//!
//! Routes every [`ChatEvent`] through the handlers enabled in the settings:
//! the forwarder, the deletion/edit detector and the command listener.

pub mod commands;
pub mod detector;
pub mod forwarder;
pub mod notice;
pub mod resolver;

use crate::cache::{CacheError, MessageCache};
use crate::client::{ChatClient, ClientError};
use crate::config::Settings;
use crate::events::ChatEvent;
use crate::logging::Mode;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, Instrument};

pub use commands::CommandListener;
pub use detector::Detector;
pub use forwarder::Forwarder;
pub use resolver::UserResolver;

/// Errors raised while handling a single event
#[derive(Error, Debug)]
pub enum RelayError {
    /// Cache read or write failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    /// Chat client call failed
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// Shared handles every handler works with
///
/// Built once at startup and passed explicitly to the handlers.
#[derive(Clone)]
pub struct RelayContext {
    /// Chat client, usually wrapped in the retry decorator
    pub client: Arc<dyn ChatClient>,
    /// Snapshot cache, present when the detector is enabled
    pub cache: Option<MessageCache>,
    /// Loaded settings
    pub settings: Arc<Settings>,
}

/// A component reacting to chat events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Mode the handler logs under
    fn mode(&self) -> Mode;

    /// React to one event; events the handler does not care about are ignored
    async fn handle(&self, event: &ChatEvent) -> Result<(), RelayError>;
}

/// Runs the registered handlers for each event, one after another
pub struct EventRouter {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventRouter {
    /// Router over an explicit handler list
    #[must_use]
    pub fn new(handlers: Vec<Box<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    /// Register the handlers enabled in the context's settings
    ///
    /// The detector is registered when either of its toggles is on and a
    /// cache is available. The command listener is always registered.
    #[must_use]
    pub fn from_context(ctx: &RelayContext) -> Self {
        let settings = &ctx.settings;
        let mut handlers: Vec<Box<dyn EventHandler>> = Vec::new();

        if let Some(detector) = Detector::from_context(ctx) {
            info!(
                delete = settings.detector.enable.delete,
                edit = settings.detector.enable.edit,
                "Deletion/edit detector enabled"
            );
            handlers.push(Box::new(detector));
        }

        if let Some(forwarder) = Forwarder::from_context(ctx) {
            info!("Forwarder enabled");
            handlers.push(Box::new(forwarder));
        }

        handlers.push(Box::new(CommandListener::new(
            settings.debug_command.clone(),
        )));

        Self { handlers }
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver one event to every handler
    ///
    /// Handler failures are logged and never stop the remaining handlers.
    pub async fn dispatch(&self, event: &ChatEvent) {
        debug!(kind = event.kind(), chat_id = event.chat_id(), "Dispatching event");
        for handler in &self.handlers {
            let span = handler.mode().span();
            if let Err(e) = handler.handle(event).instrument(span).await {
                error!(mode = %handler.mode(), kind = event.kind(), "Handler failed: {e}");
            }
        }
    }
}
