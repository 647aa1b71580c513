//! services/bot/src/engine/conversation.rs
//!
//! The per-chat state machine. One inbound event is handled at a time per chat: the
//! session is loaded, the handler for its current state runs against a working copy,
//! and the copy is persisted only if the handler succeeded. Any error leaves the stored
//! session as it was and is answered with a message. The one exception is a placed order,
//! which is saved as soon as the backend accepts it.

use dashmap::DashMap;
use shop_bot_core::domain::{
    ChatId, ConversationSession, ConversationState, InboundEvent, MessageId, OutgoingMessage,
};
use shop_bot_core::geo::{Coordinates, DeliveryFees};
use shop_bot_core::ports::{
    Catalog, ChatTransport, CommerceGateway, Geocoder, StateStore, StoreDirectory,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{CheckoutDefaults, Config};
use crate::engine::callback::Action;
use crate::engine::credentials::CredentialCache;
use crate::engine::error::{FlowError, FlowResult};
use crate::engine::render;
use crate::engine::saga::OrderSaga;

/// The collaborators the engine talks to.
#[derive(Clone)]
pub struct EngineDeps {
    pub credentials: Arc<CredentialCache>,
    pub gateway: Arc<dyn CommerceGateway>,
    pub catalog: Arc<dyn Catalog>,
    pub stores: Arc<dyn StoreDirectory>,
    /// Absent when no geocoder key is configured; typed addresses are then refused.
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub states: Arc<dyn StateStore>,
    pub transport: Arc<dyn ChatTransport>,
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub products_per_page: usize,
    pub catalog_category: Option<i64>,
    pub delivery_fees: DeliveryFees,
    pub delivery_followup: Option<Duration>,
    pub online_payment: bool,
    pub payment_currency: String,
    pub checkout: CheckoutDefaults,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            products_per_page: config.products_per_page,
            catalog_category: config.catalog_category,
            delivery_fees: config.delivery_fees,
            delivery_followup: config.delivery_followup,
            online_payment: config.payment_provider_token.is_some(),
            payment_currency: config.payment_currency.clone(),
            checkout: config.checkout.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            products_per_page: 8,
            catalog_category: None,
            delivery_fees: DeliveryFees::default(),
            delivery_followup: None,
            online_payment: false,
            payment_currency: "RUB".to_string(),
            checkout: CheckoutDefaults::default(),
        }
    }
}

/// What a state handler receives: the working copy of the session plus per-event output.
pub(crate) struct Turn {
    pub chat: ChatId,
    pub session: ConversationSession,
    /// The message whose button was pressed; deleted when a new screen replaces it.
    pub origin: Option<MessageId>,
    /// Popup text for the callback acknowledgement.
    pub alert: Option<String>,
}

/// A user input after decoding, before state dispatch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    Action(Action),
    Text(String),
    Location(Coordinates),
}

pub struct ConversationEngine {
    pub(crate) deps: EngineDeps,
    pub(crate) settings: EngineSettings,
    pub(crate) saga: OrderSaga,
    user_locks: DashMap<ChatId, Arc<Mutex<()>>>,
    pub(crate) shutdown: CancellationToken,
}

impl ConversationEngine {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        let saga = OrderSaga::new(
            deps.gateway.clone(),
            deps.credentials.clone(),
            settings.checkout.clone(),
        );
        Self {
            deps,
            settings,
            saga,
            user_locks: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token drops any scheduled follow-up messages.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The single entry point for the chat transport. Never fails: every error ends in a
    /// message to the user and an unchanged stored session.
    #[instrument(skip(self, event), fields(chat = %chat))]
    pub async fn handle_event(&self, chat: ChatId, event: InboundEvent) {
        let lock = self.user_locks.entry(chat).or_default().clone();
        {
            let _guard = lock.lock().await;
            self.handle_locked(chat, event).await;
        }
        drop(lock);
        // Only the map's own handle left means nobody is queued on this chat.
        self.user_locks
            .remove_if(&chat, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Chats with an event in flight or queued.
    pub fn busy_chats(&self) -> usize {
        self.user_locks.len()
    }

    async fn handle_locked(&self, chat: ChatId, event: InboundEvent) {
        let callback_id = match &event {
            InboundEvent::PreCheckout { query_id, payload } => {
                self.answer_pre_checkout(query_id, payload).await;
                return;
            }
            InboundEvent::PaymentSucceeded {
                payload,
                total_minor,
            } => {
                self.payment_succeeded(chat, payload, *total_minor).await;
                return;
            }
            InboundEvent::Button { callback_id, .. } => callback_id.clone(),
            _ => None,
        };

        let (alert, failure) = match self.process(chat, event).await {
            Ok(alert) => (alert, None),
            Err(e) => (None, Some(e)),
        };

        if let Some(id) = callback_id {
            if let Err(e) = self.deps.transport.answer_callback(&id, alert.as_deref()).await {
                warn!("Failed to acknowledge button press: {}", e);
            }
        }

        if let Some(e) = failure {
            match &e {
                FlowError::InvalidUserInput(_) => debug!("Input rejected: {}", e),
                _ => error!("Event handling failed: {}", e),
            }
            let reply = OutgoingMessage::text(e.user_message());
            if let Err(send_error) = self.deps.transport.send_text(chat, &reply).await {
                error!("Failed to deliver the error reply: {}", send_error);
            }
        }
    }

    async fn process(&self, chat: ChatId, event: InboundEvent) -> FlowResult<Option<String>> {
        let stored = self.deps.states.load(chat).await?;
        let origin = match &event {
            InboundEvent::Button { message_id, .. } => *message_id,
            _ => None,
        };
        let mut turn = Turn {
            chat,
            session: stored.clone(),
            origin,
            alert: None,
        };

        self.dispatch(&mut turn, event).await?;

        if turn.session != stored {
            if turn.session.state != stored.state {
                info!(
                    from = %stored.state,
                    to = %turn.session.state,
                    "Conversation state changed."
                );
            }
            self.deps.states.save(chat, &turn.session).await?;
        }
        Ok(turn.alert)
    }

    async fn dispatch(&self, turn: &mut Turn, event: InboundEvent) -> FlowResult<()> {
        let input = match event {
            InboundEvent::Command(command) if command == "start" => {
                turn.session = ConversationSession::default();
                return self.show_page(turn, 1).await;
            }
            InboundEvent::Button { data, .. } => match Action::parse(&data) {
                Some(action) => Input::Action(action),
                None => return Err(use_buttons()),
            },
            InboundEvent::Text(text) => Input::Text(text),
            InboundEvent::Location(coordinates) => Input::Location(coordinates),
            InboundEvent::Command(_)
            | InboundEvent::PreCheckout { .. }
            | InboundEvent::PaymentSucceeded { .. } => return Err(use_buttons()),
        };

        match turn.session.state {
            ConversationState::Browsing => self.on_browsing(turn, input).await,
            ConversationState::ProductDetail => self.on_product_detail(turn, input).await,
            ConversationState::CartView => self.on_cart_view(turn, input).await,
            ConversationState::AwaitingPhone => self.on_awaiting_phone(turn, input).await,
            ConversationState::AwaitingLocation => self.on_awaiting_location(turn, input).await,
            ConversationState::AwaitingDeliveryChoice => {
                self.on_awaiting_delivery_choice(turn, input).await
            }
            ConversationState::AwaitingPaymentChoice => {
                self.on_awaiting_payment_choice(turn, input).await
            }
        }
    }

    pub(crate) async fn send(
        &self,
        turn: &Turn,
        message: &OutgoingMessage,
    ) -> FlowResult<MessageId> {
        Ok(self.deps.transport.send_text(turn.chat, message).await?)
    }

    /// Deletes the message whose button was pressed, at most once per event.
    pub(crate) async fn discard_origin(&self, turn: &mut Turn) {
        if let Some(message) = turn.origin.take() {
            if let Err(e) = self.deps.transport.delete_message(turn.chat, message).await {
                debug!("Could not delete the previous screen: {}", e);
            }
        }
    }

    pub(crate) fn schedule_followup(&self, chat: ChatId, delay: Duration) {
        let transport = self.deps.transport.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(chat = %chat, "Follow-up dropped on shutdown.");
                }
                _ = tokio::time::sleep(delay) => {
                    let message = OutgoingMessage::text("Has your order arrived?");
                    if let Err(e) = transport.send_text(chat, &message).await {
                        warn!(chat = %chat, "Failed to send the delivery follow-up: {}", e);
                    }
                }
            }
        });
    }
}

pub(crate) fn use_buttons() -> FlowError {
    FlowError::InvalidUserInput(render::USE_BUTTONS.to_string())
}
