//! Configuration and settings management
//!
//! Loads the nested bot settings from layered config files and the environment,
//! and defines runtime constants.

use config::{Config, ConfigError, Environment, File};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings, read-only after load
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Chat client credentials
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Outbound request policy
    #[serde(default)]
    pub client: ClientSettings,

    /// Auto-forwarding between two chats
    #[serde(default)]
    pub forwarder: ForwarderSettings,

    /// Deletion and edit detection
    #[serde(default, rename = "del-edit-detector", alias = "del_edit_detector")]
    pub detector: DetectorSettings,

    /// Literal text that makes the bot log chat and message ids
    #[serde(default = "default_debug_command", alias = "debug_command")]
    pub debug_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram: TelegramSettings::default(),
            client: ClientSettings::default(),
            forwarder: ForwarderSettings::default(),
            detector: DetectorSettings::default(),
            debug_command: default_debug_command(),
        }
    }
}

/// Chat client credentials
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct TelegramSettings {
    /// Telegram Bot API token
    #[serde(default)]
    pub token: String,
}

/// Timeout and retry policy for every outbound chat-client call
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ClientSettings {
    /// Upper bound for a single request
    #[serde(
        default = "default_request_timeout_secs",
        alias = "request_timeout_secs"
    )]
    pub request_timeout_secs: u64,
    /// Retries after a transient failure
    #[serde(default = "default_max_retries", alias = "max_retries")]
    pub max_retries: usize,
    /// Delay before a retry
    #[serde(default = "default_retry_backoff_ms", alias = "retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ClientSettings {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry backoff as a [`Duration`]
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Forwarder settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ForwarderSettings {
    /// Whether the forwarder runs
    #[serde(default)]
    pub enable: bool,
    /// Source chat watched for new messages
    #[serde(default, alias = "chat_pull")]
    pub chat_pull: Option<i64>,
    /// Destination chat receiving the forwards
    #[serde(default, alias = "chat_publish")]
    pub chat_publish: Option<i64>,
}

/// Source and destination of the forwarder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRoute {
    /// Chat watched for new messages
    pub from_chat: i64,
    /// Chat receiving the forwards
    pub to_chat: i64,
}

impl ForwarderSettings {
    /// Configured route, if both chats are set
    #[must_use]
    pub fn route(&self) -> Option<ForwardRoute> {
        Some(ForwardRoute {
            from_chat: self.chat_pull?,
            to_chat: self.chat_publish?,
        })
    }
}

/// Per-feature toggles of the detector
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub struct DetectorToggles {
    /// Announce deleted messages
    #[serde(default)]
    pub delete: bool,
    /// Announce edited messages
    #[serde(default)]
    pub edit: bool,
}

impl DetectorToggles {
    /// Whether incoming messages need to be cached at all
    #[must_use]
    pub const fn any(&self) -> bool {
        self.delete || self.edit
    }
}

/// Deletion/edit detector settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DetectorSettings {
    /// Feature toggles
    #[serde(default)]
    pub enable: DetectorToggles,
    /// Monitored chat
    #[serde(default, alias = "checking_chat")]
    pub checking_chat: Option<i64>,
    /// Chat receiving the notices
    #[serde(default, alias = "sending_chat")]
    pub sending_chat: Option<i64>,
    /// Decorative markers, one is picked at random per notice
    #[serde(default = "default_people_emojis", alias = "people_emojis")]
    pub people_emojis: Vec<String>,
    /// Cache connection and retention
    #[serde(default)]
    pub redis: RedisSettings,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enable: DetectorToggles::default(),
            checking_chat: None,
            sending_chat: None,
            people_emojis: default_people_emojis(),
            redis: RedisSettings::default(),
        }
    }
}

/// Monitored and announcement chats of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorChats {
    /// Chat whose messages are cached and watched
    pub checking_chat: i64,
    /// Chat receiving the notices
    pub sending_chat: i64,
}

impl DetectorSettings {
    /// Configured chats, if both are set
    #[must_use]
    pub fn chats(&self) -> Option<DetectorChats> {
        Some(DetectorChats {
            checking_chat: self.checking_chat?,
            sending_chat: self.sending_chat?,
        })
    }
}

/// Redis connection and retention settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct RedisSettings {
    /// Host name
    #[serde(default = "default_redis_host")]
    pub host: String,
    /// Port
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Database index
    #[serde(default)]
    pub db: i64,
    /// Password, if the server requires one
    #[serde(default)]
    pub password: Option<String>,
    /// Retention of cached message snapshots, seconds
    #[serde(default = "default_message_ttl_secs")]
    pub ttl: u64,
    /// Retention of `deleted-` audit copies, seconds; unset or 0 keeps them forever
    #[serde(default, alias = "deleted_ttl")]
    pub deleted_ttl: Option<u64>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: None,
            ttl: default_message_ttl_secs(),
            deleted_ttl: None,
        }
    }
}

impl RedisSettings {
    /// Connection info for the `redis` client
    ///
    /// Built field by field so the password is sent verbatim, whatever
    /// characters it contains.
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..RedisConnectionInfo::default()
            },
        }
    }

    /// Snapshot retention as a [`Duration`]
    #[must_use]
    pub const fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// Audit copy retention as a [`Duration`], `None` for no expiry
    #[must_use]
    pub fn deleted_ttl(&self) -> Option<Duration> {
        self.deleted_ttl
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> usize {
    1
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_people_emojis() -> Vec<String> {
    vec![DEFAULT_MARKER.to_string()]
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_redis_port() -> u16 {
    6379
}

const fn default_message_ttl_secs() -> u64 {
    DEFAULT_MESSAGE_TTL_SECS
}

fn default_debug_command() -> String {
    ".chat".to_string()
}

/// `APP_` prefixed variables, `__` between nesting levels
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chat_audit_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the settings are inconsistent.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg. `APP_TELEGRAM__TOKEN=...` sets `telegram.token`
            .add_source(environment())
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if settings.telegram.token.is_empty() {
            if let Ok(val) = std::env::var("TELEGRAM_TOKEN") {
                if !val.is_empty() {
                    settings.telegram.token = val;
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from an already assembled [`Config`]
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if deserialization or validation fails.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every enabled feature has what it needs
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram.token is required (or set TELEGRAM_TOKEN)".into(),
            ));
        }
        if self.forwarder.enable && self.forwarder.route().is_none() {
            return Err(ConfigError::Message(
                "forwarder.chat-pull and forwarder.chat-publish are required when the forwarder is enabled"
                    .into(),
            ));
        }
        if self.detector.enable.any() && self.detector.chats().is_none() {
            return Err(ConfigError::Message(
                "del-edit-detector.checking-chat and del-edit-detector.sending-chat are required when the detector is enabled"
                    .into(),
            ));
        }
        if self.detector.enable.any() && self.detector.redis.ttl == 0 {
            return Err(ConfigError::Message(
                "del-edit-detector.redis.ttl must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Default retention of cached snapshots (7 days)
pub const DEFAULT_MESSAGE_TTL_SECS: u64 = 7 * 86_400;

/// Marker used when no decorative markers are configured
pub const DEFAULT_MARKER: &str = "🧑";

/// Maximum notice length with a safety margin below Telegram's 4096
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Lifetime of the in-process mirror of observed message versions
pub const LIVE_MESSAGE_TTL_SECS: u64 = 60 * 60;

/// Capacity of the in-process mirror of observed message versions
pub const LIVE_MESSAGE_CAPACITY: u64 = 10_000;
