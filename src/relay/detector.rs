//! Deletion and edit detection for the monitored chat.
//!
//! Every new message of the monitored chat is cached. When messages are
//! deleted or edited later, the cached version is compared against what
//! happened and a notice is posted to the announcement chat.

use super::notice::{deletion_notice, edit_notice, MarkerSet};
use super::resolver::UserResolver;
use super::{EventHandler, RelayContext, RelayError};
use crate::cache::MessageCache;
use crate::client::{ChatClient, ClientError};
use crate::config::{DetectorChats, DetectorToggles};
use crate::events::ChatEvent;
use crate::logging::Mode;
use crate::message::{normalize, Message, RawMessage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Caches messages of the monitored chat and announces deletions and edits
pub struct Detector {
    client: Arc<dyn ChatClient>,
    cache: MessageCache,
    resolver: UserResolver,
    chats: DetectorChats,
    toggles: DetectorToggles,
    markers: MarkerSet,
}

impl Detector {
    /// Create a detector
    #[must_use]
    pub fn new(
        client: Arc<dyn ChatClient>,
        cache: MessageCache,
        chats: DetectorChats,
        toggles: DetectorToggles,
        markers: MarkerSet,
    ) -> Self {
        Self {
            resolver: UserResolver::new(client.clone()),
            client,
            cache,
            chats,
            toggles,
            markers,
        }
    }

    /// Detector from the settings, `None` when both toggles are off or the
    /// chats or cache are missing
    #[must_use]
    pub fn from_context(ctx: &RelayContext) -> Option<Self> {
        let settings = &ctx.settings.detector;
        if !settings.enable.any() {
            return None;
        }
        Some(Self::new(
            ctx.client.clone(),
            ctx.cache.clone()?,
            settings.chats()?,
            settings.enable,
            MarkerSet::new(settings.people_emojis.clone()),
        ))
    }

    /// Cache a new message of the monitored chat
    ///
    /// # Errors
    ///
    /// Returns an error if the cache write fails.
    pub async fn on_new_message(&self, raw: &RawMessage) -> Result<(), RelayError> {
        if raw.chat_id != self.chats.checking_chat {
            return Ok(());
        }
        self.cache.put(raw.chat_id, raw.id, raw).await?;
        Ok(())
    }

    /// Announce every cached text message of a deletion batch
    ///
    /// Each id is handled on its own; a failure is logged and the batch
    /// continues.
    pub async fn on_messages_deleted(&self, chat_id: i64, message_ids: &[i64], from_cache: bool) {
        if chat_id != self.chats.checking_chat || from_cache {
            return;
        }
        info!(chat_id, ?message_ids, "Messages deleted");

        for &message_id in message_ids {
            if let Err(e) = self.announce_deletion(chat_id, message_id).await {
                error!(chat_id, message_id, "Failed to announce deletion: {e}");
            }
        }
    }

    async fn announce_deletion(&self, chat_id: i64, message_id: i64) -> Result<(), RelayError> {
        let Some(raw) = self.cache.get(chat_id, message_id).await? else {
            info!("Message #{message_id} in #{chat_id} deleted, but not cached");
            return Ok(());
        };

        let msg = normalize(&raw);
        // Membership changes and media without text are not announced
        if !msg.is_text_bearing() {
            debug!(message_id, content_type = %msg.content_type, "Skipping deletion");
            return Ok(());
        }

        let author = self.resolver.author_label(msg.author_id).await;
        let notice = deletion_notice(&self.markers.pick(), &author, &msg);
        self.client
            .send_message(self.chats.sending_chat, &notice)
            .await?;
        self.cache.put_deleted(chat_id, message_id, &raw).await?;
        info!(message_id, "Deletion announced");
        Ok(())
    }

    /// Compare an edited message with its cached version and announce the change
    ///
    /// # Errors
    ///
    /// Returns an error if the live fetch, the cache or the notice send fails.
    pub async fn on_message_edited(&self, chat_id: i64, message_id: i64) -> Result<(), RelayError> {
        if chat_id != self.chats.checking_chat {
            return Ok(());
        }

        let live = match self.client.get_message(chat_id, message_id).await {
            Ok(live) => live,
            Err(ClientError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(live) = live else {
            debug!(message_id, "Edited message is not available");
            return Ok(());
        };
        let Some(cached) = self.cache.get(chat_id, message_id).await? else {
            debug!(message_id, "Edited message was not cached");
            return Ok(());
        };

        self.cache.put(chat_id, message_id, &live).await?;

        let old = normalize(&cached);
        let new = normalize(&live);
        if is_unremarkable_edit(&old, &new) {
            debug!(message_id, "Edit not announced");
            return Ok(());
        }

        let author = self.resolver.author_label(new.author_id).await;
        let notice = edit_notice(&self.markers.pick(), &author, &old, &new);
        self.client
            .send_message(self.chats.sending_chat, &notice)
            .await?;
        info!(message_id, "Edit announced");
        Ok(())
    }
}

/// Same text, a side without text, or an old membership change
fn is_unremarkable_edit(old: &Message, new: &Message) -> bool {
    old.content_text == new.content_text
        || !old.has_text()
        || !new.has_text()
        || old.is_membership_change()
}

#[async_trait]
impl EventHandler for Detector {
    fn mode(&self) -> Mode {
        Mode::Detector
    }

    async fn handle(&self, event: &ChatEvent) -> Result<(), RelayError> {
        match event {
            ChatEvent::NewMessage(raw) => self.on_new_message(raw).await,
            ChatEvent::MessagesDeleted {
                chat_id,
                message_ids,
                from_cache,
            } if self.toggles.delete => {
                self.on_messages_deleted(*chat_id, message_ids, *from_cache)
                    .await;
                Ok(())
            }
            ChatEvent::MessageEdited {
                chat_id,
                message_id,
            } if self.toggles.edit => self.on_message_edited(*chat_id, *message_id).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::deleted_key;
    use crate::client::MockChatClient;
    use crate::testing::{ada, media_message, text_message, InMemoryStore};
    use mockall::predicate::*;
    use std::time::Duration;

    const CHATS: DetectorChats = DetectorChats {
        checking_chat: 100,
        sending_chat: 200,
    };
    const BOTH: DetectorToggles = DetectorToggles {
        delete: true,
        edit: true,
    };

    fn detector(client: MockChatClient, store: Arc<InMemoryStore>) -> Detector {
        let cache = MessageCache::new(store, Duration::from_secs(604_800), None);
        Detector::new(
            Arc::new(client),
            cache,
            CHATS,
            BOTH,
            MarkerSet::new(vec!["🧑".to_string()]),
        )
    }

    async fn seed(store: &Arc<InMemoryStore>, raw: &RawMessage) -> Result<(), RelayError> {
        MessageCache::new(store.clone(), Duration::from_secs(604_800), None)
            .put(raw.chat_id, raw.id, raw)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_caches_only_monitored_chat() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        let detector = detector(MockChatClient::new(), store.clone());

        detector.on_new_message(&text_message(100, 1, "a")).await?;
        detector.on_new_message(&text_message(101, 2, "b")).await?;

        assert!(store.contains("100-1"));
        assert!(!store.contains("101-2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_deletion_from_cache_never_notifies() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 42, "hello")).await?;

        let mut client = MockChatClient::new();
        client.expect_send_message().never();
        client.expect_get_user().never();

        let detector = detector(client, store.clone());
        detector.on_messages_deleted(100, &[42], true).await;

        assert!(!store.contains(&deleted_key(100, 42)));
        Ok(())
    }

    #[tokio::test]
    async fn test_deletion_is_announced() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 42, "hello")).await?;

        let mut client = MockChatClient::new();
        client.expect_get_user().with(eq(7)).returning(|_| Ok(ada()));
        client
            .expect_send_message()
            .withf(|chat, text| {
                *chat == 200 && text.contains("hello") && text.contains("Ada Lovelace [@ada]")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let detector = detector(client, store.clone());
        detector.on_messages_deleted(100, &[42, 43], false).await;

        assert!(store.contains("deleted-100-42"));
        assert!(!store.contains("deleted-100-43"));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_media_is_skipped() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &media_message(100, 5, "messagePhoto", Some("sunset"))).await?;

        let mut client = MockChatClient::new();
        client.expect_send_message().never();
        client.expect_get_user().never();

        detector(client, store).on_messages_deleted(100, &[5], false).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_notice_skips_audit_copy() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 42, "hello")).await?;

        let mut client = MockChatClient::new();
        client.expect_get_user().returning(|_| Ok(ada()));
        client
            .expect_send_message()
            .returning(|_, _| Err(ClientError::Network("reset".into())));

        detector(client, store.clone())
            .on_messages_deleted(100, &[42], false)
            .await;

        assert!(!store.contains("deleted-100-42"));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_is_announced() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 7, "foo")).await?;

        let mut client = MockChatClient::new();
        client
            .expect_get_message()
            .with(eq(100), eq(7))
            .returning(|chat, id| {
                let mut raw = text_message(chat, id, "bar");
                raw.edit_date = 1_600_000_060;
                Ok(Some(raw))
            });
        client.expect_get_user().returning(|_| Ok(ada()));
        client
            .expect_send_message()
            .withf(|chat, text| *chat == 200 && text.contains("foo") && text.contains("bar"))
            .times(1)
            .returning(|_, _| Ok(()));

        let detector = detector(client, store.clone());
        detector.on_message_edited(100, 7).await?;

        let cached = detector.cache.get(100, 7).await?;
        assert_eq!(cached.map(|raw| normalize(&raw).content_text).as_deref(), Some("bar"));
        Ok(())
    }

    #[tokio::test]
    async fn test_equal_edit_updates_cache_silently() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 7, "same")).await?;

        let mut client = MockChatClient::new();
        client.expect_get_message().returning(|chat, id| {
            let mut raw = text_message(chat, id, "same");
            raw.edit_date = 1_600_000_900;
            Ok(Some(raw))
        });
        client.expect_send_message().never();

        let detector = detector(client, store);
        detector.on_message_edited(100, 7).await?;

        let cached = detector.cache.get(100, 7).await?;
        assert_eq!(cached.map(|raw| raw.edit_date), Some(1_600_000_900));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_without_cached_version_is_silent() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        let mut client = MockChatClient::new();
        client
            .expect_get_message()
            .returning(|chat, id| Ok(Some(text_message(chat, id, "bar"))));
        client.expect_send_message().never();

        detector(client, store.clone()).on_message_edited(100, 7).await?;
        assert!(!store.contains("100-7"));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_of_unknown_live_message_is_silent() -> Result<(), RelayError> {
        let store = Arc::new(InMemoryStore::default());
        seed(&store, &text_message(100, 7, "foo")).await?;

        let mut client = MockChatClient::new();
        client
            .expect_get_message()
            .returning(|_, _| Err(ClientError::NotFound("message".into())));
        client.expect_send_message().never();

        detector(client, store).on_message_edited(100, 7).await
    }

    #[tokio::test]
    async fn test_disabled_edit_toggle_ignores_edits() -> Result<(), RelayError> {
        let mut client = MockChatClient::new();
        client.expect_get_message().never();

        let store = Arc::new(InMemoryStore::default());
        let cache = MessageCache::new(store, Duration::from_secs(60), None);
        let detector = Detector::new(
            Arc::new(client),
            cache,
            CHATS,
            DetectorToggles {
                delete: true,
                edit: false,
            },
            MarkerSet::default(),
        );

        detector
            .handle(&ChatEvent::MessageEdited {
                chat_id: 100,
                message_id: 7,
            })
            .await
    }

    #[test]
    fn test_unremarkable_edits() {
        let text = |t: &str| normalize(&text_message(100, 1, t));
        assert!(is_unremarkable_edit(&text("a"), &text("a")));
        assert!(is_unremarkable_edit(&text("a"), &text(" ")));
        assert!(!is_unremarkable_edit(&text("a"), &text("b")));

        let joined = normalize(&media_message(100, 1, "messageChatAddMembers", Some("x")));
        assert!(is_unremarkable_edit(&joined, &text("b")));
        // Only the old version's type is checked
        assert!(!is_unremarkable_edit(&text("b"), &joined));
    }
}
