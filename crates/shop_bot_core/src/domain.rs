//! crates/shop_bot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the ordering bot.
//! These structs are independent of any HTTP client, database or chat platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::{Coordinates, DeliveryTier};
use crate::money::Money;

//=========================================================================================
// Identifiers
//=========================================================================================

/// The chat platform's identifier of a conversation. Doubles as the user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message previously delivered by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Catalog product identifier, shared by the catalog store and the commerce backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier issued by the commerce backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//=========================================================================================
// Credential
//=========================================================================================

/// The opaque session token authorizing calls to the commerce backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub validated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            validated_at: Utc::now(),
        }
    }

    /// Two credentials are the same session when their token values match.
    pub fn same_session(&self, other: &Credential) -> bool {
        self.token == other.token
    }
}

// Keeps full tokens out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.token.chars().take(4).collect();
        f.debug_struct("Credential")
            .field("token", &format_args!("{}…", shown))
            .field("validated_at", &self.validated_at)
            .finish()
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

/// A product row read from the catalog store.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    pub image_url: Option<String>,
    pub description: String,
}

/// A physical store customers can pick orders up from.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub name: String,
    pub location: Coordinates,
    /// Chat of the courier who delivers orders from this store.
    pub courier: Option<ChatId>,
}

//=========================================================================================
// Cart and Orders (owned by the remote backend)
//=========================================================================================

/// One product/quantity pairing held by the remote backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub key: String,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// The cart as last read from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of the backend's line totals; nothing is recomputed locally from unit prices.
    pub fn total(&self) -> Money {
        self.lines.iter().map(|line| line.line_total).sum()
    }

    /// How many units of `product` the cart already holds.
    pub fn quantity_of(&self, product: ProductId) -> u32 {
        self.lines
            .iter()
            .filter(|line| line.product_id == product)
            .map(|line| line.quantity)
            .sum()
    }
}

/// A postal address as the backend's checkout expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub firstname: String,
    pub lastname: String,
    pub address_1: String,
    pub city: String,
    pub country_id: String,
    pub zone_id: String,
}

/// The customer attached to the backend session before submitting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub telephone: String,
}

/// A shipping or payment option listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMethod {
    pub code: String,
    pub title: String,
}

/// What the backend reports about a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub id: OrderId,
    pub total: Money,
    pub telephone: Option<String>,
}

//=========================================================================================
// Conversation
//=========================================================================================

/// The discrete step a user is at in the ordering dialogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Browsing,
    ProductDetail,
    CartView,
    AwaitingPhone,
    AwaitingLocation,
    AwaitingDeliveryChoice,
    AwaitingPaymentChoice,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Browsing => "BROWSING",
            ConversationState::ProductDetail => "PRODUCT_DETAIL",
            ConversationState::CartView => "CART_VIEW",
            ConversationState::AwaitingPhone => "AWAITING_PHONE",
            ConversationState::AwaitingLocation => "AWAITING_LOCATION",
            ConversationState::AwaitingDeliveryChoice => "AWAITING_DELIVERY_CHOICE",
            ConversationState::AwaitingPaymentChoice => "AWAITING_PAYMENT_CHOICE",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer receives the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryChoice {
    Pickup {
        store: String,
    },
    Courier {
        store: String,
        courier: Option<ChatId>,
        destination: Coordinates,
        fee: Money,
    },
}

impl DeliveryChoice {
    pub fn store(&self) -> &str {
        match self {
            DeliveryChoice::Pickup { store } | DeliveryChoice::Courier { store, .. } => store,
        }
    }

    pub fn fee(&self) -> Money {
        match self {
            DeliveryChoice::Pickup { .. } => Money::ZERO,
            DeliveryChoice::Courier { fee, .. } => *fee,
        }
    }
}

/// The nearest-store result shown to the user while they pick a delivery method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOffer {
    pub store: String,
    pub courier: Option<ChatId>,
    pub destination: Coordinates,
    pub distance_km: f64,
    pub tier: DeliveryTier,
    pub fee: Money,
}

/// An order the saga has submitted and that still awaits a payment choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub total: Money,
}

/// Everything the bot remembers about one chat between events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub state: ConversationState,
    /// Catalog page last shown, 1-based.
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default)]
    pub product: Option<ProductId>,
    /// A typed phone number waiting for the user's confirmation.
    #[serde(default)]
    pub unconfirmed_phone: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub offer: Option<DeliveryOffer>,
    #[serde(default)]
    pub delivery: Option<DeliveryChoice>,
    #[serde(default)]
    pub order: Option<PlacedOrder>,
}

fn first_page() -> usize {
    1
}

impl ConversationSession {
    /// Drops everything tied to an in-flight checkout, keeping the confirmed phone.
    pub fn reset_checkout(&mut self) {
        self.unconfirmed_phone = None;
        self.offer = None;
        self.delivery = None;
        self.order = None;
    }
}

//=========================================================================================
// Chat Events and Outgoing Messages
//=========================================================================================

/// An inbound event delivered by the chat transport.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A slash command, without the leading slash and any `@bot` suffix.
    Command(String),
    /// A press on an inline keyboard button.
    Button {
        data: String,
        callback_id: Option<String>,
        message_id: Option<MessageId>,
    },
    Text(String),
    Location(Coordinates),
    /// The payment provider asks whether an invoice may still be paid.
    PreCheckout { query_id: String, payload: String },
    PaymentSucceeded { payload: String, total_minor: i64 },
}

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    Inline(Vec<Vec<Button>>),
    /// A one-button reply keyboard asking the client to share its location.
    RequestLocation { label: String },
    /// Removes a previously shown reply keyboard.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }
}

/// A payment request rendered natively by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub label: String,
    /// Amount in the currency's minor units.
    pub amount_minor: i64,
}
