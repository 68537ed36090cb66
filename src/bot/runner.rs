//! Update loop.
//!
//! Polls Telegram with a teloxide [`Dispatcher`] and hands every translated
//! event to the [`EventRouter`]. All updates share one distribution key, so
//! they are processed strictly one at a time in arrival order.

use super::telegram::{repair_update, TelegramClient};
use crate::relay::EventRouter;
use futures_util::stream::{Map, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::stop::StopToken;
use teloxide::types::AllowedUpdate;
use teloxide::update_listeners::{AsUpdateStream, Polling, UpdateListener};
use tracing::info;

type Repair<E> = fn(Result<Update, E>) -> Result<Update, E>;

fn repair_item<E>(item: Result<Update, E>) -> Result<Update, E> {
    item.map(repair_update)
}

/// Listener passing every update through [`repair_update`]
///
/// The dispatcher discards updates teloxide failed to decode before any
/// handler sees them.
pub struct RepairingListener<L> {
    inner: L,
}

impl<L> RepairingListener<L> {
    /// Wraps `inner`
    pub const fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<'a, L> AsUpdateStream<'a> for RepairingListener<L>
where
    L: UpdateListener,
    L::Err: 'static,
{
    type StreamErr = L::Err;
    type Stream = Map<<L as AsUpdateStream<'a>>::Stream, Repair<L::Err>>;

    fn as_stream(&'a mut self) -> Self::Stream {
        self.inner
            .as_stream()
            .map(repair_item::<L::Err> as Repair<L::Err>)
    }
}

impl<L> UpdateListener for RepairingListener<L>
where
    L: UpdateListener,
    L::Err: 'static,
{
    type Err = L::Err;

    fn stop_token(&mut self) -> StopToken {
        self.inner.stop_token()
    }

    fn hint_allowed_updates(&mut self, hint: &mut dyn Iterator<Item = AllowedUpdate>) {
        self.inner.hint_allowed_updates(hint);
    }
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().endpoint(handle_update)
}

async fn handle_update(
    update: Update,
    telegram: Arc<TelegramClient>,
    router: Arc<EventRouter>,
) -> ResponseResult<()> {
    if let Some(event) = telegram.translate(&update).await {
        router.dispatch(&event).await;
    }
    Ok(())
}

/// Run the update loop until Ctrl-C
pub async fn run(telegram: Arc<TelegramClient>, router: Arc<EventRouter>) {
    let bot = telegram.bot().clone();
    let polling = Polling::builder(bot.clone())
        .timeout(Duration::from_secs(10))
        .delete_webhook()
        .await
        .build();
    info!("Relay is running...");

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![telegram, router])
        .distribution_function(|_| Some(()))
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error from the update handler",
        ))
        .enable_ctrlc_handler()
        .build();
    dispatcher
        .dispatch_with_listener(
            RepairingListener::new(polling),
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    info!("Relay stopped");
}
