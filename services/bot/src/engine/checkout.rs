//! services/bot/src/engine/checkout.rs
//!
//! Phone, location, delivery and payment steps, plus the payment callbacks that arrive
//! outside the dialogue.

use shop_bot_core::domain::{
    ChatId, ConversationState, DeliveryChoice, DeliveryOffer, Invoice, OrderId, OutgoingMessage,
    PlacedOrder, ReplyMarkup,
};
use shop_bot_core::geo::{nearest_store, Coordinates, DeliveryTier};
use shop_bot_core::phone::PhoneNumber;
use tracing::{error, info, warn};

use crate::engine::callback::Action;
use crate::engine::conversation::{use_buttons, ConversationEngine, Input, Turn};
use crate::engine::error::{FlowError, FlowResult};
use crate::engine::render;
use crate::engine::saga::OrderRequest;
use shop_bot_core::ports::PortError;

const INVOICE_PAYLOAD_PREFIX: &str = "order:";

impl ConversationEngine {
    pub(crate) async fn on_awaiting_phone(&self, turn: &mut Turn, input: Input) -> FlowResult<()> {
        match input {
            Input::Text(raw) => {
                let phone = PhoneNumber::parse(&raw).map_err(|_| {
                    FlowError::InvalidUserInput(format!(
                        "That does not look like a phone number. {}",
                        render::PHONE_PROMPT
                    ))
                })?;
                self.send(turn, &render::phone_confirmation(&phone)).await?;
                turn.session.unconfirmed_phone = Some(phone.e164().to_string());
                Ok(())
            }
            Input::Action(Action::ConfirmPhone) => {
                let phone = turn.session.unconfirmed_phone.take().ok_or_else(use_buttons)?;
                self.discard_origin(turn).await;
                self.send(turn, &render::location_request()).await?;
                turn.session.phone = Some(phone);
                turn.session.state = ConversationState::AwaitingLocation;
                Ok(())
            }
            Input::Action(Action::RejectPhone) => {
                self.discard_origin(turn).await;
                self.send(turn, &OutgoingMessage::text(render::PHONE_PROMPT))
                    .await?;
                turn.session.unconfirmed_phone = None;
                Ok(())
            }
            _ => Err(use_buttons()),
        }
    }

    pub(crate) async fn on_awaiting_location(
        &self,
        turn: &mut Turn,
        input: Input,
    ) -> FlowResult<()> {
        let destination = match input {
            Input::Location(coordinates) => coordinates,
            Input::Text(address) => self.geocode(&address).await?,
            Input::Action(_) => return Err(use_buttons()),
        };

        let offer = self.offer_for(destination).await?;
        info!(store = %offer.store, distance_km = offer.distance_km, "Delivery offer computed.");

        self.send(
            turn,
            &OutgoingMessage::text("Thank you!").with_markup(ReplyMarkup::Remove),
        )
        .await?;
        self.send(turn, &render::delivery_offer(&offer)).await?;
        turn.session.offer = Some(offer);
        turn.session.state = ConversationState::AwaitingDeliveryChoice;
        Ok(())
    }

    pub(crate) async fn on_awaiting_delivery_choice(
        &self,
        turn: &mut Turn,
        input: Input,
    ) -> FlowResult<()> {
        let offer = turn.session.offer.clone().ok_or_else(use_buttons)?;
        let delivery = match input {
            Input::Action(Action::Pickup) => DeliveryChoice::Pickup {
                store: offer.store.clone(),
            },
            Input::Action(Action::Courier) => DeliveryChoice::Courier {
                store: offer.store.clone(),
                courier: offer.courier,
                destination: offer.destination,
                fee: offer.fee,
            },
            _ => return Err(use_buttons()),
        };
        let phone = turn.session.phone.clone().ok_or_else(|| {
            FlowError::InvalidUserInput("Please send /start and check out again.".to_string())
        })?;

        let cart = self.read_cart().await?;
        let request = OrderRequest {
            chat: turn.chat,
            cart,
            phone,
            delivery: delivery.clone(),
        };
        let id = self.saga.place_order(&request).await?;
        let order = PlacedOrder {
            id,
            total: request.cart.total() + delivery.fee(),
        };
        // The order exists in the backend now; nothing below may fail the turn.
        turn.session.delivery = Some(delivery.clone());
        turn.session.order = Some(order.clone());
        turn.session.state = ConversationState::AwaitingPaymentChoice;
        self.deps.states.save(turn.chat, &turn.session).await?;
        info!(order = %order.id, "Order recorded in the session.");

        self.discard_origin(turn).await;
        let note = match &delivery {
            DeliveryChoice::Pickup { store } => {
                format!("Your order will be waiting for you at {}.", store)
            }
            DeliveryChoice::Courier { .. } => {
                "Your order has been passed to the courier.".to_string()
            }
        };
        self.send_best_effort(turn, &OutgoingMessage::text(note)).await;

        if let DeliveryChoice::Courier {
            courier,
            destination,
            ..
        } = &delivery
        {
            self.notify_courier(&request, &order, *courier, *destination).await;
            if let Some(delay) = self.settings.delivery_followup {
                self.schedule_followup(turn.chat, delay);
            }
        }

        self.send_best_effort(turn, &render::order_placed(&order, self.settings.online_payment))
            .await;
        Ok(())
    }

    pub(crate) async fn on_awaiting_payment_choice(
        &self,
        turn: &mut Turn,
        input: Input,
    ) -> FlowResult<()> {
        let order = turn.session.order.clone().ok_or_else(use_buttons)?;
        match input {
            Input::Action(Action::PayOnline) => {
                if !self.settings.online_payment {
                    return Err(FlowError::InvalidUserInput(
                        "Online payment is not available. Please pay on delivery.".to_string(),
                    ));
                }
                let gateway = &self.deps.gateway;
                let id = order.id;
                let details = self
                    .deps
                    .credentials
                    .call(|credential| async move { gateway.read_order(&credential, id).await })
                    .await?;
                let invoice = Invoice {
                    title: format!("Order #{}", order.id),
                    description: format!("Payment for order #{}", order.id),
                    payload: format!("{}{}", INVOICE_PAYLOAD_PREFIX, order.id),
                    currency: self.settings.payment_currency.clone(),
                    label: "Total".to_string(),
                    amount_minor: details.total.minor(),
                };
                self.discard_origin(turn).await;
                self.deps.transport.send_invoice(turn.chat, &invoice).await?;
                info!(order = %order.id, amount_minor = invoice.amount_minor, "Invoice sent.");
            }
            Input::Action(Action::PayCash) => {
                self.discard_origin(turn).await;
                self.send(
                    turn,
                    &OutgoingMessage::text(format!(
                        "Thank you for your order #{}! You will pay on delivery.\nSend /start to keep shopping.",
                        order.id
                    )),
                )
                .await?;
            }
            _ => return Err(use_buttons()),
        }
        turn.session.reset_checkout();
        turn.session.state = ConversationState::Browsing;
        Ok(())
    }

    /// Approves only invoices this bot issued.
    pub(crate) async fn answer_pre_checkout(&self, query_id: &str, payload: &str) {
        let verdict = match parse_invoice_payload(payload) {
            Some(order) => {
                info!(order = %order, "Approving pre-checkout query.");
                None
            }
            None => {
                warn!(payload, "Declining pre-checkout query with an unknown payload.");
                Some("Something went wrong. Please try again.")
            }
        };
        if let Err(e) = self.deps.transport.answer_pre_checkout(query_id, verdict).await {
            error!("Failed to answer pre-checkout query: {}", e);
        }
    }

    pub(crate) async fn payment_succeeded(&self, chat: ChatId, payload: &str, total_minor: i64) {
        info!(payload, total_minor, "Payment received.");
        let message = OutgoingMessage::text(
            "Thank you for your payment!\nSend /start to keep shopping.",
        );
        if let Err(e) = self.deps.transport.send_text(chat, &message).await {
            error!("Failed to thank for the payment: {}", e);
        }
    }

    async fn send_best_effort(&self, turn: &Turn, message: &OutgoingMessage) {
        if let Err(e) = self.send(turn, message).await {
            warn!(chat = %turn.chat, "Failed to deliver an order update: {}", e);
        }
    }

    async fn geocode(&self, address: &str) -> FlowResult<Coordinates> {
        let share = || {
            FlowError::InvalidUserInput(
                "We could not find that address. Please share your location instead.".to_string(),
            )
        };
        let geocoder = self.deps.geocoder.as_ref().ok_or_else(share)?;
        match geocoder.geocode(address).await {
            Ok(Some(coordinates)) => Ok(coordinates),
            Ok(None) => Err(share()),
            Err(e) => {
                warn!("Geocoder failed: {}", e);
                Err(share())
            }
        }
    }

    async fn offer_for(&self, destination: Coordinates) -> FlowResult<DeliveryOffer> {
        let stores = self.deps.stores.list_stores().await?;
        let (store, distance_km) = nearest_store(&destination, &stores)
            .ok_or_else(|| PortError::Unexpected("no stores are configured".to_string()))?;
        let tier = DeliveryTier::from_distance(distance_km);
        let fee = self.settings.delivery_fees.fee_for(tier).ok_or_else(|| {
            FlowError::InvalidUserInput(format!(
                "Sorry, we do not deliver that far: the nearest store is {:.1} km away. Please share another location.",
                distance_km
            ))
        })?;
        Ok(DeliveryOffer {
            store: store.name.clone(),
            courier: store.courier,
            destination,
            distance_km,
            tier,
            fee,
        })
    }

    async fn notify_courier(
        &self,
        request: &OrderRequest,
        order: &PlacedOrder,
        courier: Option<ChatId>,
        destination: Coordinates,
    ) {
        let Some(courier) = courier else {
            warn!(store = request.delivery.store(), "No courier attached to the store.");
            return;
        };
        let summary = render::courier_summary(order, &request.cart, &request.phone, request.chat);
        if let Err(e) = self.deps.transport.send_text(courier, &summary).await {
            error!(courier = %courier, "Failed to notify the courier: {}", e);
            return;
        }
        if let Err(e) = self.deps.transport.send_location(courier, destination).await {
            error!(courier = %courier, "Failed to send the destination: {}", e);
        }
    }
}

fn parse_invoice_payload(payload: &str) -> Option<OrderId> {
    payload
        .strip_prefix(INVOICE_PAYLOAD_PREFIX)?
        .parse()
        .ok()
        .map(OrderId)
}
