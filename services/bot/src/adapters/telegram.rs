//! services/bot/src/adapters/telegram.rs
//!
//! Telegram Bot API implementation of the `ChatTransport` port.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shop_bot_core::domain::{ChatId, Invoice, MessageId, OutgoingMessage, ReplyMarkup};
use shop_bot_core::geo::Coordinates;
use shop_bot_core::ports::{ChatTransport, PortError, PortResult};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    payment_provider_token: Option<String>,
}

impl TelegramTransport {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        payment_provider_token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            payment_provider_token,
        }
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> PortResult<T> {
        debug!(method, "Calling the Telegram Bot API.");
        let response = self
            .client
            .post(self.url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("telegram {} request: {}", method, e)))?;

        let body: TelegramResponse<T> = response.json().await.map_err(|e| {
            PortError::Unexpected(format!("decode telegram {} response: {}", method, e))
        })?;
        if body.ok {
            return body.result.ok_or_else(|| {
                PortError::Unexpected(format!("telegram {} returned no result", method))
            });
        }
        if body.error_code == Some(401) {
            return Err(PortError::Unauthorized);
        }
        Err(PortError::Unexpected(format!(
            "telegram {} failed: {}",
            method,
            body.description.unwrap_or_else(|| "unknown error".into())
        )))
    }

    fn with_markup(mut payload: Value, markup: &Option<ReplyMarkup>) -> Value {
        if let (Some(markup), Some(object)) = (markup, payload.as_object_mut()) {
            object.insert("reply_markup".to_string(), reply_markup_json(markup));
        }
        payload
    }
}

/// The Bot API's JSON form of a keyboard.
pub fn reply_markup_json(markup: &ReplyMarkup) -> Value {
    match markup {
        ReplyMarkup::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.data }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        ReplyMarkup::RequestLocation { label } => json!({
            "keyboard": [[{ "text": label, "request_location": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        }),
        ReplyMarkup::Remove => json!({ "remove_keyboard": true }),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    #[instrument(skip(self, message), fields(chat = %chat))]
    async fn send_text(&self, chat: ChatId, message: &OutgoingMessage) -> PortResult<MessageId> {
        let payload = Self::with_markup(
            json!({ "chat_id": chat.0, "text": message.text }),
            &message.markup,
        );
        let sent: SentMessage = self.call("sendMessage", &payload).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &OutgoingMessage,
    ) -> PortResult<MessageId> {
        let payload = Self::with_markup(
            json!({ "chat_id": chat.0, "photo": photo_url, "caption": caption.text }),
            &caption.markup,
        );
        let sent: SentMessage = self.call("sendPhoto", &payload).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> PortResult<()> {
        let payload = json!({ "chat_id": chat.0, "message_id": message.0 });
        self.call::<bool>("deleteMessage", &payload).await?;
        Ok(())
    }

    async fn send_location(&self, chat: ChatId, location: Coordinates) -> PortResult<()> {
        let payload = json!({
            "chat_id": chat.0,
            "latitude": location.lat,
            "longitude": location.lon,
        });
        self.call::<Value>("sendLocation", &payload).await?;
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: &Invoice) -> PortResult<()> {
        let provider_token = self.payment_provider_token.as_deref().ok_or_else(|| {
            PortError::Unexpected("no payment provider token is configured".to_string())
        })?;
        let payload = json!({
            "chat_id": chat.0,
            "title": invoice.title,
            "description": invoice.description,
            "payload": invoice.payload,
            "provider_token": provider_token,
            "currency": invoice.currency,
            "prices": [{ "label": invoice.label, "amount": invoice.amount_minor }],
        });
        self.call::<Value>("sendInvoice", &payload).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> PortResult<()> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let (Some(text), Some(object)) = (alert, payload.as_object_mut()) {
            object.insert("text".to_string(), json!(text));
            object.insert("show_alert".to_string(), json!(true));
        }
        self.call::<bool>("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    async fn answer_pre_checkout(&self, query_id: &str, error: Option<&str>) -> PortResult<()> {
        let payload = match error {
            None => json!({ "pre_checkout_query_id": query_id, "ok": true }),
            Some(message) => json!({
                "pre_checkout_query_id": query_id,
                "ok": false,
                "error_message": message,
            }),
        };
        self.call::<bool>("answerPreCheckoutQuery", &payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_bot_core::domain::Button;

    #[test]
    fn builds_method_urls() {
        let transport = TelegramTransport::new(
            reqwest::Client::new(),
            "https://api.telegram.org/",
            "123:abc",
            None,
        );
        assert_eq!(
            transport.url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn inline_keyboard_json() {
        let markup = ReplyMarkup::Inline(vec![vec![
            Button::new("«", "page:0"),
            Button::new("»", "page:2"),
        ]]);
        assert_eq!(
            reply_markup_json(&markup),
            json!({ "inline_keyboard": [[
                { "text": "«", "callback_data": "page:0" },
                { "text": "»", "callback_data": "page:2" }
            ]] })
        );
    }

    #[test]
    fn location_request_and_removal_json() {
        let request = reply_markup_json(&ReplyMarkup::RequestLocation {
            label: "Share".to_string(),
        });
        assert_eq!(request["keyboard"][0][0]["request_location"], json!(true));
        assert_eq!(
            reply_markup_json(&ReplyMarkup::Remove),
            json!({ "remove_keyboard": true })
        );
    }
}
