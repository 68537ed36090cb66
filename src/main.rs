use chat_audit_relay::bot::{runner, ResilientClient, TelegramClient};
use chat_audit_relay::cache::{MessageCache, RedisStore};
use chat_audit_relay::client::ChatClient;
use chat_audit_relay::config::Settings;
use chat_audit_relay::logging::init_logging;
use chat_audit_relay::relay::{EventRouter, RelayContext};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::Bot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting chat audit relay...");

    let settings = init_settings();
    let cache = init_cache(&settings).await;

    let telegram = Arc::new(TelegramClient::new(
        Bot::new(settings.telegram.token.clone()),
        settings.detector.checking_chat,
    ));
    let client: Arc<dyn ChatClient> = Arc::new(ResilientClient::from_settings(
        telegram.clone(),
        &settings.client,
    ));

    match client.login().await {
        Ok(me) => info!(
            "Logged in as @{} (#{})",
            me.username.unwrap_or_default(),
            me.id
        ),
        Err(e) => {
            error!("Failed to log in: {e}");
            std::process::exit(1);
        }
    }

    let ctx = RelayContext {
        client,
        cache,
        settings,
    };
    let router = Arc::new(EventRouter::from_context(&ctx));
    info!("{} handler(s) registered", router.len());

    runner::run(telegram, router).await;

    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_cache(settings: &Settings) -> Option<MessageCache> {
    if !settings.detector.enable.any() {
        return None;
    }

    let redis = &settings.detector.redis;
    match RedisStore::connect(redis).await {
        Ok(store) => Some(MessageCache::from_settings(Arc::new(store), redis)),
        Err(e) => {
            error!("Redis not connected: {}", e);
            std::process::exit(1);
        }
    }
}
