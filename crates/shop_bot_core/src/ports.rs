//! crates/shop_bot_core/src/ports.rs
//!
//! Defines the service contracts (traits) the ordering core depends on.
//! These traits form the boundary of the hexagonal architecture: the conversation
//! engine only ever talks to the commerce backend, the catalog, the chat platform and
//! the state store through them.

use async_trait::async_trait;

use crate::domain::{
    Address, Cart, ChatId, CheckoutMethod, ConversationSession, Credential, Customer, Invoice,
    MessageId, OrderDetails, OrderId, OutgoingMessage, Product, ProductId, Store,
};
use crate::geo::Coordinates;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for the local ports (catalog, stores, geocoder, chat, state).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Commerce Backend Errors
//=========================================================================================

/// How a call against the commerce backend can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The backend rejected the session token.
    #[error("session token rejected by the commerce backend")]
    SessionInvalid,
    /// Transport-level failure: timeout, refused connection, non-2xx or unreadable body.
    #[error("commerce backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend answered with a domain error (e.g. out of stock).
    #[error("commerce backend rejected the request: {0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The login exchange itself failed; no credential could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("login exchange failed: {0}")]
pub struct AuthFailure(pub String);

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Performs the login exchange against the backend's authentication endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self) -> Result<Credential, AuthFailure>;
}

/// Typed wrapper around the remote commerce API. Stateless beyond the credential it is
/// handed; retry and refresh policy belongs to the caller.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    async fn add_to_cart(
        &self,
        credential: &Credential,
        product: ProductId,
        quantity: u32,
    ) -> GatewayResult<()>;

    async fn remove_from_cart(&self, credential: &Credential, line_key: &str) -> GatewayResult<()>;

    async fn read_cart(&self, credential: &Credential) -> GatewayResult<Cart>;

    async fn set_shipping_address(
        &self,
        credential: &Credential,
        address: &Address,
    ) -> GatewayResult<()>;

    async fn list_shipping_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>>;

    async fn set_shipping_method(&self, credential: &Credential, code: &str) -> GatewayResult<()>;

    async fn set_payment_address(
        &self,
        credential: &Credential,
        address: &Address,
    ) -> GatewayResult<()>;

    async fn list_payment_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>>;

    async fn set_payment_method(&self, credential: &Credential, code: &str) -> GatewayResult<()>;

    async fn set_customer(&self, credential: &Credential, customer: &Customer) -> GatewayResult<()>;

    async fn submit_order(&self, credential: &Credential) -> GatewayResult<OrderId>;

    async fn read_order(
        &self,
        credential: &Credential,
        order: OrderId,
    ) -> GatewayResult<OrderDetails>;
}

/// Per-chat conversation persistence. An absent entry is the initial session.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, chat: ChatId) -> PortResult<ConversationSession>;
    async fn save(&self, chat: ChatId, session: &ConversationSession) -> PortResult<()>;
}

/// Read-only product lookups.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All products, optionally restricted to one category, in a stable order.
    async fn list_products(&self, category: Option<i64>) -> PortResult<Vec<Product>>;
    async fn get_product(&self, id: ProductId) -> PortResult<Product>;
}

/// The physical stores and the couriers attached to them.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn list_stores(&self) -> PortResult<Vec<Store>>;
}

/// Best-effort address lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the address is not recognised.
    async fn geocode(&self, address: &str) -> PortResult<Option<Coordinates>>;
}

/// Outbound capabilities of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat: ChatId, message: &OutgoingMessage) -> PortResult<MessageId>;

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &OutgoingMessage,
    ) -> PortResult<MessageId>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> PortResult<()>;

    async fn send_location(&self, chat: ChatId, location: Coordinates) -> PortResult<()>;

    async fn send_invoice(&self, chat: ChatId, invoice: &Invoice) -> PortResult<()>;

    /// Acknowledges a button press, optionally showing `alert` as a popup.
    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> PortResult<()>;

    /// Approves (`error == None`) or declines a pending payment.
    async fn answer_pre_checkout(&self, query_id: &str, error: Option<&str>) -> PortResult<()>;
}
