//! services/bot/src/config.rs
//!
//! Defines the bot's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use shop_bot_core::{DeliveryFees, Money};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Fixed values the backend's checkout requires but the chat dialogue never asks for.
#[derive(Clone, Debug)]
pub struct CheckoutDefaults {
    pub firstname: String,
    pub city: String,
    pub country_id: String,
    pub zone_id: String,
    pub email: String,
    pub pickup_shipping_code: String,
    pub courier_shipping_code: String,
    pub payment_method_code: String,
}

impl Default for CheckoutDefaults {
    fn default() -> Self {
        Self {
            firstname: "Telegram".to_string(),
            city: "Minusinsk".to_string(),
            country_id: "176".to_string(),
            zone_id: "2761".to_string(),
            email: "orders@example.com".to_string(),
            pickup_shipping_code: "pickup.pickup".to_string(),
            courier_shipping_code: "flat.flat".to_string(),
            payment_method_code: "cod".to_string(),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub opencart_url: String,
    pub opencart_api_user: String,
    pub opencart_api_key: String,
    pub catalog_database_url: String,
    pub http_timeout: Duration,
    pub catalog_category: Option<i64>,
    pub catalog_language_id: i64,
    pub products_per_page: usize,
    pub telegram_bot_token: String,
    pub telegram_api_base: String,
    pub telegram_secret_token: Option<String>,
    pub geocoder_api_key: Option<String>,
    pub payment_provider_token: Option<String>,
    pub payment_currency: String,
    pub delivery_fees: DeliveryFees,
    /// `None` disables the "has your order arrived?" follow-up.
    pub delivery_followup: Option<Duration>,
    pub redis_url: Option<String>,
    pub session_namespace: String,
    pub checkout: CheckoutDefaults,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server Settings ---
        let bind_address: SocketAddr =
            parse_var("BIND_ADDRESS", &or_default("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Commerce Backend Settings ---
        let opencart_url = required("OPENCART_URL")?.trim_end_matches('/').to_string();
        let opencart_api_user = required("OPENCART_API_USER_NAME")?;
        let opencart_api_key = required("OPENCART_API_KEY")?;
        let catalog_database_url = required("OPENCART_DATABASE_URL")?;
        let http_timeout_secs: u64 =
            parse_var("HTTP_TIMEOUT_SECS", &or_default("HTTP_TIMEOUT_SECS", "10"))?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "HTTP_TIMEOUT_SECS".to_string(),
                "timeout must be at least one second".to_string(),
            ));
        }

        // --- Load Catalog Settings ---
        let catalog_category = lookup("CATALOG_CATEGORY_ID")
            .map(|raw| parse_var::<i64>("CATALOG_CATEGORY_ID", &raw))
            .transpose()?;
        let catalog_language_id: i64 =
            parse_var("OPENCART_LANGUAGE_ID", &or_default("OPENCART_LANGUAGE_ID", "1"))?;
        let products_per_page: usize =
            parse_var("PRODUCTS_PER_PAGE", &or_default("PRODUCTS_PER_PAGE", "8"))?;
        if products_per_page == 0 {
            return Err(ConfigError::InvalidValue(
                "PRODUCTS_PER_PAGE".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- Load Chat Platform Settings ---
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_api_base = or_default("TELEGRAM_API_BASE", "https://api.telegram.org");
        let telegram_secret_token = lookup("TELEGRAM_SECRET_TOKEN");

        // --- Load Optional Integrations ---
        let geocoder_api_key = lookup("YANDEX_GEOCODER_API_KEY");
        let payment_provider_token = lookup("PAYMENT_PROVIDER_TOKEN");
        let payment_currency = or_default("PAYMENT_CURRENCY", "RUB");

        // --- Load Delivery Settings ---
        let near: i64 = parse_var("DELIVERY_FEE_NEAR", &or_default("DELIVERY_FEE_NEAR", "100"))?;
        let far: i64 = parse_var("DELIVERY_FEE_FAR", &or_default("DELIVERY_FEE_FAR", "300"))?;
        let followup_secs: u64 =
            parse_var("DELIVERY_FOLLOWUP_SECS", &or_default("DELIVERY_FOLLOWUP_SECS", "60"))?;

        // --- Load Session Store Settings ---
        let redis_url = lookup("REDIS_URL");
        let session_namespace = or_default("SESSION_NAMESPACE", "shopbot");

        let defaults = CheckoutDefaults::default();
        let checkout = CheckoutDefaults {
            firstname: lookup("CHECKOUT_FIRSTNAME").unwrap_or(defaults.firstname),
            city: lookup("CHECKOUT_CITY").unwrap_or(defaults.city),
            country_id: lookup("CHECKOUT_COUNTRY_ID").unwrap_or(defaults.country_id),
            zone_id: lookup("CHECKOUT_ZONE_ID").unwrap_or(defaults.zone_id),
            email: lookup("CHECKOUT_EMAIL").unwrap_or(defaults.email),
            pickup_shipping_code: lookup("SHIPPING_PICKUP_CODE")
                .unwrap_or(defaults.pickup_shipping_code),
            courier_shipping_code: lookup("SHIPPING_COURIER_CODE")
                .unwrap_or(defaults.courier_shipping_code),
            payment_method_code: lookup("PAYMENT_METHOD_CODE")
                .unwrap_or(defaults.payment_method_code),
        };

        Ok(Self {
            bind_address,
            log_level,
            opencart_url,
            opencart_api_user,
            opencart_api_key,
            catalog_database_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            catalog_category,
            catalog_language_id,
            products_per_page,
            telegram_bot_token,
            telegram_api_base,
            telegram_secret_token,
            geocoder_api_key,
            payment_provider_token,
            payment_currency,
            delivery_fees: DeliveryFees {
                near: Money::from_major(near),
                far: Money::from_major(far),
            },
            delivery_followup: (followup_secs > 0).then(|| Duration::from_secs(followup_secs)),
            redis_url,
            session_namespace,
            checkout,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
