//! Shared in-memory fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bot_lib::adapters::MemoryStateStore;
use bot_lib::engine::{ConversationEngine, CredentialCache, EngineDeps, EngineSettings};
use shop_bot_core::domain::{
    Address, Cart, CartLine, ChatId, CheckoutMethod, ConversationSession, Credential, Customer,
    InboundEvent, Invoice, MessageId, OrderDetails, OrderId, OutgoingMessage, Product, ProductId,
    Store,
};
use shop_bot_core::geo::Coordinates;
use shop_bot_core::money::Money;
use shop_bot_core::ports::{
    AuthFailure, Authenticator, Catalog, ChatTransport, CommerceGateway, GatewayError,
    GatewayResult, Geocoder, PortError, PortResult, StateStore, StoreDirectory,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CUSTOMER: ChatId = ChatId(1001);
pub const COURIER: ChatId = ChatId(900);

//=========================================================================================
// Commerce Backend
//=========================================================================================

#[derive(Default)]
struct BackendState {
    current_token: Option<String>,
    issued: usize,
    login_attempts: usize,
    fail_logins: bool,
    login_delay: Duration,
    prices: HashMap<ProductId, (String, Money)>,
    lines: Vec<CartLine>,
    calls: Vec<String>,
    planned_failures: VecDeque<(String, GatewayError)>,
    next_order: i64,
    orders: HashMap<OrderId, Money>,
    customer: Option<Customer>,
    shipping_address: Option<Address>,
    shipping_method: Option<String>,
}

/// A single-tenant backend that issues `token-N` on each login and rejects any other token.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new(products: &[Product]) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock().unwrap();
            state.next_order = 100;
            for product in products {
                state
                    .prices
                    .insert(product.id, (product.name.clone(), product.price));
            }
        }
        backend
    }

    pub fn login_attempts(&self) -> usize {
        self.state.lock().unwrap().login_attempts
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.state.lock().unwrap().login_delay = delay;
    }

    pub fn set_fail_logins(&self, fail: bool) {
        self.state.lock().unwrap().fail_logins = fail;
    }

    /// Drops the backend-side session; the next call with the old token is rejected.
    pub fn expire_session(&self) {
        self.state.lock().unwrap().current_token = None;
    }

    /// The next call to `op` fails with `error`. A planned `SessionInvalid` also expires
    /// the session, as a real token timeout would.
    pub fn fail_once(&self, op: &str, error: GatewayError) {
        self.state
            .lock()
            .unwrap()
            .planned_failures
            .push_back((op.to_string(), error));
    }

    /// Every gateway call in order, including rejected ones.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.state.lock().unwrap().lines.clone()
    }

    pub fn customer(&self) -> Option<Customer> {
        self.state.lock().unwrap().customer.clone()
    }

    pub fn shipping_method(&self) -> Option<String> {
        self.state.lock().unwrap().shipping_method.clone()
    }

    pub fn shipping_address(&self) -> Option<Address> {
        self.state.lock().unwrap().shipping_address.clone()
    }

    fn check(&self, op: &str, credential: &Credential) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        if state.current_token.as_deref() != Some(credential.token.as_str()) {
            return Err(GatewayError::SessionInvalid);
        }
        if let Some(pos) = state.planned_failures.iter().position(|(o, _)| o == op) {
            let (_, error) = state
                .planned_failures
                .remove(pos)
                .expect("position is in range");
            if error == GatewayError::SessionInvalid {
                state.current_token = None;
            }
            return Err(error);
        }
        Ok(())
    }
}

fn line_total(price: Money, quantity: u32) -> Money {
    Money::from_minor(price.minor() * quantity as i64)
}

#[async_trait]
impl Authenticator for FakeBackend {
    async fn login(&self) -> Result<Credential, AuthFailure> {
        let delay = self.state.lock().unwrap().login_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.login_attempts += 1;
        if state.fail_logins {
            return Err(AuthFailure("invalid api key".to_string()));
        }
        state.issued += 1;
        let token = format!("token-{}", state.issued);
        state.current_token = Some(token.clone());
        Ok(Credential::new(token))
    }
}

#[async_trait]
impl CommerceGateway for FakeBackend {
    async fn add_to_cart(
        &self,
        credential: &Credential,
        product: ProductId,
        quantity: u32,
    ) -> GatewayResult<()> {
        self.check("add_to_cart", credential)?;
        let mut state = self.state.lock().unwrap();
        let (name, price) = state
            .prices
            .get(&product)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected("Product not found".to_string()))?;
        if let Some(i) = state.lines.iter().position(|l| l.product_id == product) {
            let line = &mut state.lines[i];
            line.quantity += quantity;
            line.line_total = line_total(line.unit_price, line.quantity);
        } else {
            state.lines.push(CartLine {
                key: format!("k{}", product),
                product_id: product,
                name,
                quantity,
                unit_price: price,
                line_total: line_total(price, quantity),
            });
        }
        Ok(())
    }

    async fn remove_from_cart(&self, credential: &Credential, line_key: &str) -> GatewayResult<()> {
        self.check("remove_from_cart", credential)?;
        self.state
            .lock()
            .unwrap()
            .lines
            .retain(|line| line.key != line_key);
        Ok(())
    }

    async fn read_cart(&self, credential: &Credential) -> GatewayResult<Cart> {
        self.check("read_cart", credential)?;
        Ok(Cart {
            lines: self.state.lock().unwrap().lines.clone(),
        })
    }

    async fn set_shipping_address(
        &self,
        credential: &Credential,
        address: &Address,
    ) -> GatewayResult<()> {
        self.check("set_shipping_address", credential)?;
        self.state.lock().unwrap().shipping_address = Some(address.clone());
        Ok(())
    }

    async fn list_shipping_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>> {
        self.check("list_shipping_methods", credential)?;
        Ok(vec![
            CheckoutMethod {
                code: "pickup.pickup".to_string(),
                title: "Pickup From Store".to_string(),
            },
            CheckoutMethod {
                code: "flat.flat".to_string(),
                title: "Flat Shipping Rate".to_string(),
            },
        ])
    }

    async fn set_shipping_method(&self, credential: &Credential, code: &str) -> GatewayResult<()> {
        self.check("set_shipping_method", credential)?;
        self.state.lock().unwrap().shipping_method = Some(code.to_string());
        Ok(())
    }

    async fn set_payment_address(
        &self,
        credential: &Credential,
        _address: &Address,
    ) -> GatewayResult<()> {
        self.check("set_payment_address", credential)
    }

    async fn list_payment_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>> {
        self.check("list_payment_methods", credential)?;
        Ok(vec![CheckoutMethod {
            code: "cod".to_string(),
            title: "Cash On Delivery".to_string(),
        }])
    }

    async fn set_payment_method(&self, credential: &Credential, _code: &str) -> GatewayResult<()> {
        self.check("set_payment_method", credential)
    }

    async fn set_customer(
        &self,
        credential: &Credential,
        customer: &Customer,
    ) -> GatewayResult<()> {
        self.check("set_customer", credential)?;
        self.state.lock().unwrap().customer = Some(customer.clone());
        Ok(())
    }

    async fn submit_order(&self, credential: &Credential) -> GatewayResult<OrderId> {
        self.check("submit_order", credential)?;
        let mut state = self.state.lock().unwrap();
        if state.lines.is_empty() {
            return Err(GatewayError::Rejected("Cart is empty".to_string()));
        }
        state.next_order += 1;
        let id = OrderId(state.next_order);
        let total = state.lines.iter().map(|l| l.line_total).sum();
        state.orders.insert(id, total);
        state.lines.clear();
        Ok(id)
    }

    async fn read_order(
        &self,
        credential: &Credential,
        order: OrderId,
    ) -> GatewayResult<OrderDetails> {
        self.check("read_order", credential)?;
        let state = self.state.lock().unwrap();
        let total = *state
            .orders
            .get(&order)
            .ok_or_else(|| GatewayError::Rejected("Order not found".to_string()))?;
        Ok(OrderDetails {
            id: order,
            total,
            telephone: state.customer.as_ref().map(|c| c.telephone.clone()),
        })
    }
}

//=========================================================================================
// Catalog, Stores and Geocoder
//=========================================================================================

/// Twenty products; product 12 is a 180.00 latte.
pub fn sample_products() -> Vec<Product> {
    (1..=20)
        .map(|id| Product {
            id: ProductId(id),
            name: if id == 12 {
                "Latte".to_string()
            } else {
                format!("Item {}", id)
            },
            price: if id == 12 {
                Money::from_major(180)
            } else {
                Money::from_major(100 + id)
            },
            quantity: 10,
            image_url: None,
            description: String::new(),
        })
        .collect()
}

pub struct FakeCatalog {
    products: Vec<Product>,
}

impl FakeCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn list_products(&self, _category: Option<i64>) -> PortResult<Vec<Product>> {
        Ok(self.products.clone())
    }

    async fn get_product(&self, id: ProductId) -> PortResult<Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }
}

pub fn central() -> Coordinates {
    Coordinates::new(53.7100, 91.6870)
}

/// A point `km` kilometres due north of `origin`; negative goes south.
pub fn north_of(origin: Coordinates, km: f64) -> Coordinates {
    let degrees = km / (6371.0088 * std::f64::consts::PI / 180.0);
    Coordinates::new(origin.lat + degrees, origin.lon)
}

pub fn sample_stores() -> Vec<Store> {
    vec![
        Store {
            name: "Central".to_string(),
            location: central(),
            courier: Some(COURIER),
        },
        Store {
            name: "Riverside".to_string(),
            location: north_of(central(), -40.0),
            courier: None,
        },
    ]
}

pub struct FakeStores(pub Vec<Store>);

#[async_trait]
impl StoreDirectory for FakeStores {
    async fn list_stores(&self) -> PortResult<Vec<Store>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct FakeGeocoder {
    known: HashMap<String, Coordinates>,
}

impl FakeGeocoder {
    pub fn with(address: &str, at: Coordinates) -> Self {
        Self {
            known: HashMap::from([(address.to_string(), at)]),
        }
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> PortResult<Option<Coordinates>> {
        Ok(self.known.get(address).copied())
    }
}

//=========================================================================================
// Chat Transport
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat: ChatId, message: OutgoingMessage },
    Photo { chat: ChatId, url: String, caption: OutgoingMessage },
    Deleted { chat: ChatId, message: MessageId },
    Location { chat: ChatId, location: Coordinates },
    Invoice { chat: ChatId, invoice: Invoice },
    CallbackAnswer { id: String, alert: Option<String> },
    PreCheckoutAnswer { id: String, error: Option<String> },
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
    fail_next: Mutex<Option<String>>,
}

impl RecordingTransport {
    /// The next text message starting with `prefix` fails instead of being delivered.
    pub fn fail_next_text(&self, prefix: &str) {
        *self.fail_next.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Text of every message and photo caption delivered to `chat`.
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, message } if c == chat => Some(message.text),
                Sent::Photo { chat: c, caption, .. } if c == chat => Some(caption.text),
                _ => None,
            })
            .collect()
    }

    pub fn last_message(&self, chat: ChatId) -> Option<OutgoingMessage> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Text { chat: c, message } if c == chat => Some(message),
            Sent::Photo { chat: c, caption, .. } if c == chat => Some(caption),
            _ => None,
        })
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Invoice { invoice, .. } => Some(invoice),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> MessageId {
        self.sent.lock().unwrap().push(sent);
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat: ChatId, message: &OutgoingMessage) -> PortResult<MessageId> {
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if fail_next
                .as_deref()
                .is_some_and(|prefix| message.text.starts_with(prefix))
            {
                *fail_next = None;
                return Err(PortError::Unexpected("chat platform unavailable".to_string()));
            }
        }
        Ok(self.record(Sent::Text {
            chat,
            message: message.clone(),
        }))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &OutgoingMessage,
    ) -> PortResult<MessageId> {
        Ok(self.record(Sent::Photo {
            chat,
            url: photo_url.to_string(),
            caption: caption.clone(),
        }))
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> PortResult<()> {
        self.record(Sent::Deleted { chat, message });
        Ok(())
    }

    async fn send_location(&self, chat: ChatId, location: Coordinates) -> PortResult<()> {
        self.record(Sent::Location { chat, location });
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: &Invoice) -> PortResult<()> {
        self.record(Sent::Invoice {
            chat,
            invoice: invoice.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> PortResult<()> {
        self.record(Sent::CallbackAnswer {
            id: callback_id.to_string(),
            alert: alert.map(str::to_string),
        });
        Ok(())
    }

    async fn answer_pre_checkout(&self, query_id: &str, error: Option<&str>) -> PortResult<()> {
        self.record(Sent::PreCheckoutAnswer {
            id: query_id.to_string(),
            error: error.map(str::to_string),
        });
        Ok(())
    }
}

//=========================================================================================
// Engine Harness
//=========================================================================================

pub struct Harness {
    pub engine: Arc<ConversationEngine>,
    pub backend: Arc<FakeBackend>,
    pub credentials: Arc<CredentialCache>,
    pub transport: Arc<RecordingTransport>,
    pub states: Arc<MemoryStateStore>,
    callbacks: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self::build(settings, Some(FakeGeocoder::with("Lenina 1", north_of(central(), 3.0))))
    }

    pub fn build(settings: EngineSettings, geocoder: Option<FakeGeocoder>) -> Self {
        let products = sample_products();
        let backend = Arc::new(FakeBackend::new(&products));
        let credentials = Arc::new(CredentialCache::new(backend.clone()));
        let transport = Arc::new(RecordingTransport::default());
        let states = Arc::new(MemoryStateStore::new());
        let deps = EngineDeps {
            credentials: credentials.clone(),
            gateway: backend.clone(),
            catalog: Arc::new(FakeCatalog::new(products)),
            stores: Arc::new(FakeStores(sample_stores())),
            geocoder: geocoder.map(|g| Arc::new(g) as Arc<dyn Geocoder>),
            states: states.clone(),
            transport: transport.clone(),
        };
        Self {
            engine: Arc::new(ConversationEngine::new(deps, settings)),
            backend,
            credentials,
            transport,
            states,
            callbacks: AtomicUsize::new(0),
        }
    }

    pub async fn command(&self, chat: ChatId, name: &str) {
        self.engine
            .handle_event(chat, InboundEvent::Command(name.to_string()))
            .await;
    }

    pub async fn press(&self, chat: ChatId, data: &str) {
        let n = self.callbacks.fetch_add(1, Ordering::SeqCst);
        let event = InboundEvent::Button {
            data: data.to_string(),
            callback_id: Some(format!("cb-{}", n)),
            message_id: Some(MessageId(1)),
        };
        self.engine.handle_event(chat, event).await;
    }

    pub async fn say(&self, chat: ChatId, text: &str) {
        self.engine
            .handle_event(chat, InboundEvent::Text(text.to_string()))
            .await;
    }

    pub async fn share_location(&self, chat: ChatId, at: Coordinates) {
        self.engine
            .handle_event(chat, InboundEvent::Location(at))
            .await;
    }

    pub async fn session(&self, chat: ChatId) -> ConversationSession {
        self.states.load(chat).await.unwrap()
    }

    /// Drives a fresh chat up to the delivery choice with two lattes in the cart.
    pub async fn checkout_to_delivery_choice(&self, chat: ChatId, at: Coordinates) {
        self.command(chat, "start").await;
        self.press(chat, "product:12").await;
        self.press(chat, "add:12:2").await;
        self.press(chat, "cart").await;
        self.press(chat, "checkout").await;
        self.say(chat, "+7 912 345 6789").await;
        self.press(chat, "phone:yes").await;
        self.share_location(chat, at).await;
    }
}
