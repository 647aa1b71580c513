//! services/bot/src/bin/bot.rs

use bot_lib::{
    adapters::{
        MemoryStateStore, OpenCartAdapter, SqlCatalog, TelegramTransport, YandexGeocoder,
    },
    config::Config,
    engine::{ConversationEngine, CredentialCache, EngineDeps, EngineSettings},
    error::BotError,
    web::{self, AppState},
};
use shop_bot_core::ports::{Geocoder, StateStore};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting bot...");

    // --- 2. Connect to the Catalog Database ---
    info!("Connecting to the catalog database...");
    let catalog_pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&config.catalog_database_url)
        .await?;
    let catalog = Arc::new(SqlCatalog::new(
        catalog_pool,
        &config.opencart_url,
        config.catalog_language_id,
    ));

    // --- 3. Initialize Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let opencart = Arc::new(OpenCartAdapter::new(
        http.clone(),
        &config.opencart_url,
        config.opencart_api_user.clone(),
        config.opencart_api_key.clone(),
    ));
    let credentials = Arc::new(CredentialCache::new(opencart.clone()));

    let transport = Arc::new(TelegramTransport::new(
        http.clone(),
        config.telegram_api_base.clone(),
        config.telegram_bot_token.clone(),
        config.payment_provider_token.clone(),
    ));

    let geocoder = match &config.geocoder_api_key {
        Some(key) => {
            let geocoder = YandexGeocoder::new(http.clone(), key.clone());
            Some(Arc::new(geocoder) as Arc<dyn Geocoder>)
        }
        None => {
            warn!("YANDEX_GEOCODER_API_KEY is not set; typed addresses will be refused.");
            None
        }
    };
    if config.payment_provider_token.is_none() {
        warn!("PAYMENT_PROVIDER_TOKEN is not set; online payment is disabled.");
    }

    let states = state_store(&config).await?;

    // --- 4. Build the Conversation Engine and the Shared AppState ---
    let engine = Arc::new(ConversationEngine::new(
        EngineDeps {
            credentials,
            gateway: opencart,
            catalog: catalog.clone(),
            stores: catalog,
            geocoder,
            states,
            transport,
        },
        EngineSettings::from_config(&config),
    ));
    let shutdown = engine.shutdown_token();

    let app_state = Arc::new(AppState {
        engine,
        secret_token: config.telegram_secret_token.clone(),
    });
    let app = web::router(app_state);

    // --- 5. Start the Server ---
    info!("Listening for Telegram updates on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for the shutdown signal: {}", e);
            }
            info!("Shutting down; cancelling scheduled follow-ups.");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

#[cfg(feature = "redis-store")]
async fn state_store(config: &Config) -> Result<Arc<dyn StateStore>, BotError> {
    use bot_lib::adapters::RedisStateStore;

    match &config.redis_url {
        Some(url) => {
            info!("Keeping conversation state in Redis.");
            let store = RedisStateStore::connect(url, config.session_namespace.clone())
                .await
                .map_err(|e| BotError::StateStore(format!("Redis: {}", e)))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStateStore::new())),
    }
}

#[cfg(not(feature = "redis-store"))]
async fn state_store(config: &Config) -> Result<Arc<dyn StateStore>, BotError> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but the bot was built without the redis-store feature.");
    }
    info!("Keeping conversation state in memory.");
    Ok(Arc::new(MemoryStateStore::new()))
}
