//! Notice texts posted to the announcement chat.

use crate::config::{DEFAULT_MARKER, TELEGRAM_MESSAGE_LIMIT};
use crate::message::Message;
use crate::utils::{format_timestamp, truncate_str};
use rand::seq::IndexedRandom;

/// Decorative markers prefixed to notices
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<String>,
}

impl MarkerSet {
    /// Create a set from the configured markers
    #[must_use]
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    /// Pick a marker uniformly at random, [`DEFAULT_MARKER`] when empty
    #[must_use]
    pub fn pick(&self) -> String {
        self.markers
            .choose(&mut rand::rng())
            .map_or_else(|| DEFAULT_MARKER.to_string(), String::clone)
    }
}

/// Notice for a deleted message, stamped with its send time
#[must_use]
pub fn deletion_notice(marker: &str, author: &str, msg: &Message) -> String {
    let text = format!(
        "{marker} {author}:\n{}\n\n🗑️ **@{}**: {}",
        format_timestamp(msg.sent_at),
        msg.content_type,
        msg.content_text
    );
    fit(text)
}

/// Before/after notice for an edited message, stamped with the edit time
#[must_use]
pub fn edit_notice(marker: &str, author: &str, old: &Message, new: &Message) -> String {
    let text = format!(
        "{marker} {author}:\n{}\n\n✏️ **@{}**: {}\nto\n✏️ **@{}**: {}\n",
        format_timestamp(new.last_changed_at()),
        old.content_type,
        old.content_text,
        new.content_type,
        new.content_text
    );
    fit(text)
}

fn fit(text: String) -> String {
    if text.chars().count() > TELEGRAM_MESSAGE_LIMIT {
        truncate_str(text, TELEGRAM_MESSAGE_LIMIT)
    } else {
        text
    }
}
