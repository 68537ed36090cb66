#![warn(missing_docs)]
//! Chat audit relay library.
//!
//! Watches Telegram chats, forwards new messages between two chats and
//! announces deleted or edited messages of a monitored chat, backed by a
//! Redis snapshot cache.

/// Telegram adapter, retry decorator and update loop.
pub mod bot;
/// Message snapshot cache.
pub mod cache;
/// Chat client port.
pub mod client;
/// Configuration management.
pub mod config;
/// Relay events.
pub mod events;
/// Logging setup and component spans.
pub mod logging;
/// Message and user records.
pub mod message;
/// Event routing and relay components.
pub mod relay;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
