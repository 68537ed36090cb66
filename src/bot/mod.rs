/// Timeout and retry decorator for chat clients
pub mod resilient;
/// Dispatcher loop feeding the relay
pub mod runner;
/// Telegram Bot API adapter
pub mod telegram;

pub use resilient::ResilientClient;
pub use telegram::{LiveMessages, TelegramClient};
