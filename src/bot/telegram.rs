//! Telegram Bot API adapter.
//!
//! Implements [`ChatClient`] on top of `teloxide` and translates incoming
//! updates into [`ChatEvent`]s.
//!
//! The Bot API cannot fetch a message by id, so the adapter keeps a short-lived
//! mirror of the latest version of every message it has seen and serves
//! [`ChatClient::get_message`] from it. Deletions are only reported by the
//! platform for business chats.

use crate::client::{ChatClient, ClientError, ForwardRequest, UserProfile};
use crate::config::{LIVE_MESSAGE_CAPACITY, LIVE_MESSAGE_TTL_SECS};
use crate::events::ChatEvent;
use crate::message::{RawContent, RawMessage};
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{MessageId, MessageKind, UpdateKind, User};
use teloxide::RequestError;
use tracing::{debug, warn};

/// Latest observed version of recent messages, keyed by `(chat_id, message_id)`
#[derive(Clone)]
pub struct LiveMessages {
    cache: Cache<(i64, i64), RawMessage>,
}

impl LiveMessages {
    /// Creates a mirror with the given capacity and entry lifetime
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Records the current version of a message
    pub async fn record(&self, raw: RawMessage) {
        self.cache.insert((raw.chat_id, raw.id), raw).await;
    }

    /// Returns the latest recorded version of a message
    pub async fn latest(&self, chat_id: i64, message_id: i64) -> Option<RawMessage> {
        self.cache.get(&(chat_id, message_id)).await
    }
}

impl Default for LiveMessages {
    fn default() -> Self {
        Self::new(LIVE_MESSAGE_TTL_SECS, LIVE_MESSAGE_CAPACITY)
    }
}

/// [`ChatClient`] backed by a Telegram bot
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
    member_chat: Option<i64>,
    live: LiveMessages,
}

impl TelegramClient {
    /// Creates a client
    ///
    /// Users are looked up as members of `member_chat`, the only place a bot
    /// can see arbitrary user profiles.
    #[must_use]
    pub fn new(bot: Bot, member_chat: Option<i64>) -> Self {
        Self {
            bot,
            member_chat,
            live: LiveMessages::default(),
        }
    }

    /// Underlying bot handle
    #[must_use]
    pub const fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Translates an update into a relay event, recording any message it carries
    pub async fn translate(&self, update: &Update) -> Option<ChatEvent> {
        match &update.kind {
            UpdateKind::Message(msg)
            | UpdateKind::ChannelPost(msg)
            | UpdateKind::BusinessMessage(msg) => {
                let raw = to_raw(msg);
                self.live.record(raw.clone()).await;
                Some(ChatEvent::NewMessage(raw))
            }
            UpdateKind::EditedMessage(msg)
            | UpdateKind::EditedChannelPost(msg)
            | UpdateKind::EditedBusinessMessage(msg) => {
                let raw = to_raw(msg);
                let event = ChatEvent::MessageEdited {
                    chat_id: raw.chat_id,
                    message_id: raw.id,
                };
                self.live.record(raw).await;
                Some(event)
            }
            UpdateKind::DeletedBusinessMessages(deleted) => Some(ChatEvent::MessagesDeleted {
                chat_id: deleted.chat.id.0,
                message_ids: deleted
                    .message_ids
                    .iter()
                    .map(|id| i64::from(id.0))
                    .collect(),
                from_cache: false,
            }),
            UpdateKind::Error(value) => {
                let deleted = undecoded_deletion(value);
                if deleted.is_none() {
                    debug!(update_id = update.id.0, "Ignoring undecoded update");
                }
                deleted
            }
            _ => {
                debug!(update_id = update.id.0, "Ignoring update");
                None
            }
        }
    }
}

/// Deletion report as sent by the Bot API, with plain integer message ids
#[derive(Deserialize)]
struct DeletionReport {
    chat: ReportedChat,
    message_ids: Vec<i64>,
}

#[derive(Deserialize)]
struct ReportedChat {
    id: i64,
}

fn undecoded_deletion(value: &Value) -> Option<ChatEvent> {
    let report =
        DeletionReport::deserialize(value.get("deleted_business_messages")?).ok()?;
    Some(ChatEvent::MessagesDeleted {
        chat_id: report.chat.id,
        message_ids: report.message_ids,
        from_cache: false,
    })
}

/// Re-decodes a business deletion that teloxide could not parse
///
/// The Bot API reports deleted ids as plain integers while teloxide expects
/// `{"message_id": n}` objects, so such updates arrive as
/// [`UpdateKind::Error`] carrying the raw JSON. The dispatcher drops those,
/// so they are rewritten into the typed shape first. Any other update is
/// returned unchanged.
#[must_use]
pub fn repair_update(update: Update) -> Update {
    let deleted = match &update.kind {
        UpdateKind::Error(value) => value.get("deleted_business_messages").cloned(),
        _ => None,
    };
    let Some(mut deleted) = deleted else {
        return update;
    };
    if let Some(ids) = deleted.get_mut("message_ids").and_then(Value::as_array_mut) {
        for id in ids.iter_mut().filter(|id| id.is_i64()) {
            let raw = id.take();
            *id = json!({ "message_id": raw });
        }
    }

    let patched = json!({ "update_id": update.id.0, "deleted_business_messages": deleted });
    match serde_json::from_str::<Update>(&patched.to_string()) {
        Ok(repaired) if !matches!(repaired.kind, UpdateKind::Error(_)) => repaired,
        _ => {
            warn!(update_id = update.id.0, "Could not decode business deletion");
            update
        }
    }
}

/// Converts a Telegram message into the relay payload
#[must_use]
pub fn to_raw(msg: &Message) -> RawMessage {
    let sender_user_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.cast_signed())
        .or_else(|| msg.sender_chat.as_ref().map(|chat| chat.id.0))
        .unwrap_or(0);
    let can_be_forwarded = match &msg.kind {
        MessageKind::Common(common) => !common.has_protected_content,
        _ => false,
    };

    RawMessage {
        id: i64::from(msg.id.0),
        chat_id: msg.chat.id.0,
        sender_user_id,
        date: msg.date.timestamp(),
        edit_date: msg.edit_date().map_or(0, |d| d.timestamp()),
        can_be_forwarded,
        content: Some(content_of(msg)),
    }
}

fn content_of(msg: &Message) -> RawContent {
    if let Some(text) = msg.text() {
        return RawContent::text(text);
    }

    let kind = if msg.photo().is_some() {
        "messagePhoto"
    } else if msg.video().is_some() {
        "messageVideo"
    } else if msg.animation().is_some() {
        "messageAnimation"
    } else if msg.audio().is_some() {
        "messageAudio"
    } else if msg.voice().is_some() {
        "messageVoiceNote"
    } else if msg.document().is_some() {
        "messageDocument"
    } else if msg.sticker().is_some() {
        "messageSticker"
    } else if msg.video_note().is_some() {
        "messageVideoNote"
    } else if msg.new_chat_members().is_some() {
        "messageChatAddMembers"
    } else if msg.left_chat_member().is_some() {
        "messageChatDeleteMember"
    } else {
        "messageUnsupported"
    };
    RawContent::media(kind, msg.caption().map(str::to_string))
}

fn to_profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id.0.cast_signed(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone().unwrap_or_default(),
        username: user.username.clone(),
        phone_number: None,
    }
}

fn map_err(e: RequestError) -> ClientError {
    match e {
        RequestError::Network(e) => ClientError::Network(e.to_string()),
        RequestError::RetryAfter(secs) => ClientError::RetryAfter(secs.duration()),
        RequestError::Api(api) => {
            let text = api.to_string();
            if text.to_lowercase().contains("not found") {
                ClientError::NotFound(text)
            } else {
                ClientError::Api(text)
            }
        }
        other => ClientError::Api(other.to_string()),
    }
}

fn message_id(id: i64) -> Result<MessageId, ClientError> {
    i32::try_from(id)
        .map(MessageId)
        .map_err(|_| ClientError::InvalidId(id))
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn login(&self) -> Result<UserProfile, ClientError> {
        let me = self.bot.get_me().await.map_err(map_err)?;
        Ok(to_profile(&me.user))
    }

    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ClientError> {
        let chat = self
            .member_chat
            .ok_or_else(|| ClientError::NotFound(format!("user {user_id}")))?;
        let id = u64::try_from(user_id).map_err(|_| ClientError::InvalidId(user_id))?;
        let member = self
            .bot
            .get_chat_member(ChatId(chat), UserId(id))
            .await
            .map_err(map_err)?;
        Ok(to_profile(&member.user))
    }

    async fn get_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<RawMessage>, ClientError> {
        Ok(self.live.latest(chat_id, message_id).await)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError> {
        self.bot
            .send_message(ChatId(chat_id), text.to_string())
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn forward_messages(&self, request: &ForwardRequest) -> Result<(), ClientError> {
        let to = ChatId(request.to_chat);
        let from = ChatId(request.from_chat);
        let ids = request
            .message_ids
            .iter()
            .map(|&id| message_id(id))
            .collect::<Result<Vec<_>, _>>()?;
        let options = request.options;

        if request.send_copy {
            self.bot
                .copy_messages(to, from, ids)
                .remove_caption(request.remove_caption)
                .disable_notification(options.disable_notification)
                .protect_content(options.protect_content)
                .await
                .map_err(map_err)?;
        } else if request.as_album || ids.len() == 1 {
            self.bot
                .forward_messages(to, from, ids)
                .disable_notification(options.disable_notification)
                .protect_content(options.protect_content)
                .await
                .map_err(map_err)?;
        } else {
            for id in ids {
                self.bot
                    .forward_message(to, from, id)
                    .disable_notification(options.disable_notification)
                    .protect_content(options.protect_content)
                    .await
                    .map_err(map_err)?;
            }
        }
        Ok(())
    }
}
