//! services/bot/src/web/protocol.rs
//!
//! The subset of the Telegram `Update` object the bot reacts to, and its translation into
//! an `InboundEvent` for the conversation engine.

use serde::Deserialize;
use shop_bot_core::domain::{ChatId, InboundEvent, MessageId};
use shop_bot_core::geo::Coordinates;

//=========================================================================================
// Updates Sent FROM Telegram TO the Bot
//=========================================================================================

#[derive(Deserialize, Debug)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

#[derive(Deserialize, Debug)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Deserialize, Debug)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug)]
pub struct User {
    pub id: i64,
}

#[derive(Deserialize, Debug)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// Absent when the originating message is too old.
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    pub invoice_payload: String,
}

#[derive(Deserialize, Debug)]
pub struct SuccessfulPayment {
    pub invoice_payload: String,
    pub total_amount: i64,
}

//=========================================================================================
// Translation
//=========================================================================================

impl Update {
    /// `None` for update kinds the bot ignores (edits, stickers, channel posts...).
    pub fn into_event(self) -> Option<(ChatId, InboundEvent)> {
        if let Some(query) = self.callback_query {
            let chat = query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id);
            let event = InboundEvent::Button {
                data: query.data.unwrap_or_default(),
                callback_id: Some(query.id),
                message_id: query.message.map(|m| MessageId(m.message_id)),
            };
            return Some((ChatId(chat), event));
        }

        if let Some(query) = self.pre_checkout_query {
            let event = InboundEvent::PreCheckout {
                query_id: query.id,
                payload: query.invoice_payload,
            };
            return Some((ChatId(query.from.id), event));
        }

        let message = self.message?;
        let chat = ChatId(message.chat.id);
        if let Some(payment) = message.successful_payment {
            return Some((
                chat,
                InboundEvent::PaymentSucceeded {
                    payload: payment.invoice_payload,
                    total_minor: payment.total_amount,
                },
            ));
        }
        if let Some(location) = message.location {
            let coordinates = Coordinates::new(location.latitude, location.longitude);
            return Some((chat, InboundEvent::Location(coordinates)));
        }
        let text = message.text?;
        let event = match parse_command(&text) {
            Some(command) => InboundEvent::Command(command),
            None => InboundEvent::Text(text),
        };
        Some((chat, event))
    }
}

/// `"/start@shop_bot payload"` becomes `"start"`.
fn parse_command(text: &str) -> Option<String> {
    let word = text.trim().split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_lowercase())
}
