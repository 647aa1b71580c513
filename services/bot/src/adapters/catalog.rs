//! services/bot/src/adapters/catalog.rs
//!
//! This module contains the catalog adapter, the concrete implementation of the `Catalog`
//! and `StoreDirectory` ports. It reads the storefront's MySQL database directly using
//! `sqlx`; the commerce API has no catalog routes.

use async_trait::async_trait;
use serde_json::Value;
use shop_bot_core::domain::{ChatId, Product, ProductId, Store};
use shop_bot_core::geo::Coordinates;
use shop_bot_core::money::Money;
use shop_bot_core::ports::{Catalog, PortError, PortResult, StoreDirectory};
use sqlx::{FromRow, MySqlPool};
use tracing::warn;

const PRODUCT_SELECT: &str = "SELECT CAST(p.product_id AS SIGNED) AS id, \
        pd.name AS name, \
        CAST(ROUND(p.price * 100) AS SIGNED) AS price_minor, \
        CAST(p.quantity AS SIGNED) AS quantity, \
        p.image AS image, \
        pd.description AS description \
    FROM oc_product AS p \
    LEFT JOIN oc_product_description AS pd \
        ON pd.product_id = p.product_id AND pd.language_id = ?";

const STORE_SELECT: &str = "SELECT l.name AS name, l.geocode AS geocode, \
        (SELECT c.custom_field FROM oc_customer AS c \
            JOIN oc_customer_group_description AS cgd \
                ON cgd.customer_group_id = c.customer_group_id \
            WHERE cgd.name = l.name \
            ORDER BY c.customer_id \
            LIMIT 1) AS courier_field \
    FROM oc_location AS l \
    ORDER BY l.name";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A catalog adapter that implements the `Catalog` and `StoreDirectory` ports.
#[derive(Clone)]
pub struct SqlCatalog {
    pool: MySqlPool,
    image_base: String,
    language_id: i64,
}

impl SqlCatalog {
    /// `site_url` is the storefront root; product images live under `{site_url}/image/`.
    /// Names and descriptions are read in `language_id` only.
    pub fn new(pool: MySqlPool, site_url: &str, language_id: i64) -> Self {
        Self {
            pool,
            image_base: format!("{}/image/", site_url.trim_end_matches('/')),
            language_id,
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProductRecord {
    id: i64,
    name: Option<String>,
    price_minor: i64,
    quantity: i64,
    image: Option<String>,
    description: Option<String>,
}

impl ProductRecord {
    fn to_domain(self, image_base: &str) -> Product {
        Product {
            id: ProductId(self.id),
            name: self.name.unwrap_or_else(|| format!("Product {}", self.id)),
            price: Money::from_minor(self.price_minor),
            quantity: self.quantity,
            image_url: self
                .image
                .filter(|path| !path.trim().is_empty())
                .map(|path| format!("{}{}", image_base, path)),
            description: self.description.unwrap_or_default(),
        }
    }
}

#[derive(FromRow)]
struct StoreRecord {
    name: String,
    geocode: String,
    courier_field: Option<String>,
}

impl StoreRecord {
    /// `None` when the stored geocode is unusable.
    fn to_domain(self) -> Option<Store> {
        let Some(location) = Coordinates::parse_pair(&self.geocode) else {
            warn!(
                store = %self.name,
                geocode = %self.geocode,
                "Skipping store with an invalid geocode."
            );
            return None;
        };
        Some(Store {
            courier: self.courier_field.as_deref().and_then(courier_chat),
            name: self.name,
            location,
        })
    }
}

/// The courier's chat id is the first numeric value of the customer's custom fields,
/// stored as a JSON object such as `{"1":"123456789"}`.
fn courier_chat(custom_field: &str) -> Option<ChatId> {
    let value: Value = serde_json::from_str(custom_field).ok()?;
    value.as_object()?.values().find_map(|v| match v {
        Value::String(s) => s.trim().parse().ok().map(ChatId),
        Value::Number(n) => n.as_i64().map(ChatId),
        _ => None,
    })
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl Catalog for SqlCatalog {
    async fn list_products(&self, category: Option<i64>) -> PortResult<Vec<Product>> {
        let records = match category {
            Some(category) => {
                let sql = format!(
                    "{} JOIN oc_product_to_category AS pc ON pc.product_id = p.product_id \
                     WHERE p.status = 1 AND pc.category_id = ? \
                     ORDER BY p.sort_order, p.product_id",
                    PRODUCT_SELECT
                );
                sqlx::query_as::<_, ProductRecord>(&sql)
                    .bind(self.language_id)
                    .bind(category)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "{} WHERE p.status = 1 ORDER BY p.sort_order, p.product_id",
                    PRODUCT_SELECT
                );
                sqlx::query_as::<_, ProductRecord>(&sql)
                    .bind(self.language_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| r.to_domain(&self.image_base))
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> PortResult<Product> {
        let sql = format!("{} WHERE p.product_id = ? LIMIT 1", PRODUCT_SELECT);
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(self.language_id)
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Product {} not found", id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain(&self.image_base))
    }
}

#[async_trait]
impl StoreDirectory for SqlCatalog {
    async fn list_stores(&self) -> PortResult<Vec<Store>> {
        let records = sqlx::query_as::<_, StoreRecord>(STORE_SELECT)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().filter_map(StoreRecord::to_domain).collect())
    }
}
