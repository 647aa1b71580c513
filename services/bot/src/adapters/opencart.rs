//! services/bot/src/adapters/opencart.rs
//!
//! This module contains the commerce backend adapter, the concrete implementation of the
//! `Authenticator` and `CommerceGateway` ports. It talks to the OpenCart storefront API
//! over HTTP using `reqwest`.
//!
//! The API reports domain failures with a 200 status and an `error` field, and a PHP
//! notice may precede the JSON body; both are handled by `decode_body`.

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use shop_bot_core::domain::{
    Address, Cart, CartLine, CheckoutMethod, Credential, Customer, OrderDetails, OrderId,
    ProductId,
};
use shop_bot_core::money::Money;
use shop_bot_core::ports::{
    AuthFailure, Authenticator, CommerceGateway, GatewayError, GatewayResult,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter for the OpenCart API that implements the backend ports.
#[derive(Clone)]
pub struct OpenCartAdapter {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    api_key: String,
}

impl OpenCartAdapter {
    /// `base_url` is the storefront root, e.g. `https://shop.example.com`. The client is
    /// expected to carry the request timeout.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/index.php", base_url.trim_end_matches('/')),
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    async fn post(
        &self,
        route: &str,
        credential: Option<&Credential>,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> GatewayResult<String> {
        let mut params: Vec<(&str, String)> = vec![("route", format!("api/{}", route))];
        if let Some(credential) = credential {
            params.push(("api_token", credential.token.clone()));
        }
        params.extend(query.iter().cloned());

        let response = self
            .client
            .post(&self.endpoint)
            .query(&params)
            .form(form)
            .send()
            .await
            .map_err(|e| unavailable(route, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| unavailable(route, e))?;
        if !status.is_success() {
            return Err(GatewayError::BackendUnavailable(format!(
                "{} returned HTTP {}",
                route, status
            )));
        }
        debug!(route, body = %body, "OpenCart response.");
        Ok(body)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        route: &str,
        credential: &Credential,
        form: &[(&str, String)],
    ) -> GatewayResult<T> {
        let body = self.post(route, Some(credential), &[], form).await?;
        decode(&body)
    }
}

fn unavailable(route: &str, e: reqwest::Error) -> GatewayError {
    GatewayError::BackendUnavailable(format!("{}: {}", route, e))
}

//=========================================================================================
// Response Decoding
//=========================================================================================

/// Strips any PHP notice, parses the JSON and turns an `error` field into a
/// `GatewayError`.
pub fn decode_body(raw: &str) -> GatewayResult<Value> {
    let tail = raw.rsplit("</b>").next().unwrap_or(raw);
    let json = tail.find(['{', '[']).map_or(tail, |start| &tail[start..]).trim();
    let value: Value = serde_json::from_str(json).map_err(|e| {
        GatewayError::BackendUnavailable(format!("unreadable response body: {}", e))
    })?;
    if let Some(error) = value.get("error") {
        if let Some(failure) = classify_error(error) {
            return Err(failure);
        }
    }
    Ok(value)
}

fn decode<T: DeserializeOwned>(raw: &str) -> GatewayResult<T> {
    let value = decode_body(raw)?;
    serde_json::from_value(value).map_err(|e| {
        GatewayError::BackendUnavailable(format!("unexpected response shape: {}", e))
    })
}

/// `None` for an empty error field, which the API emits on success in some routes.
fn classify_error(error: &Value) -> Option<GatewayError> {
    if let Some(warning) = error.get("warning").and_then(Value::as_str) {
        if warning.to_lowercase().contains("permission") {
            return Some(GatewayError::SessionInvalid);
        }
    }
    let messages: Vec<String> = match error {
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => map.values().map(scalar_text).collect(),
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        Value::Null | Value::Bool(false) => Vec::new(),
        other => vec![other.to_string()],
    };
    let messages: Vec<String> = messages.into_iter().filter(|m| !m.is_empty()).collect();
    if messages.is_empty() {
        return None;
    }
    Some(GatewayError::Rejected(messages.join("; ")))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers arrive as JSON numbers or as strings, depending on the route.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => Ok(i),
        Scalar::Float(f) => Ok(f as i64),
        Scalar::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Text(s) => s,
    })
}

fn lenient_money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => Ok(Money::from_major(i)),
        Scalar::Float(f) => Ok(Money::from_minor((f * 100.0).round() as i64)),
        Scalar::Text(s) => Money::parse_lenient(&s)
            .ok_or_else(|| de::Error::custom(format!("unparsable amount {:?}", s))),
    }
}

/// PHP encodes an empty associative array as `[]`.
fn map_values<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<T> {
        Map(BTreeMap<String, T>),
        List(Vec<T>),
    }
    Ok(match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => map.into_values().collect(),
        MapOrList::List(list) => list,
    })
}

//=========================================================================================
// "Impure" Response Records
//=========================================================================================

#[derive(Deserialize)]
struct LoginRecord {
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct CartRecord {
    #[serde(default)]
    products: Vec<CartProductRecord>,
}

#[derive(Deserialize)]
struct CartProductRecord {
    #[serde(deserialize_with = "lenient_string")]
    cart_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    product_id: i64,
    name: String,
    #[serde(deserialize_with = "lenient_i64")]
    quantity: i64,
    #[serde(deserialize_with = "lenient_money")]
    price: Money,
    #[serde(deserialize_with = "lenient_money")]
    total: Money,
}

impl CartProductRecord {
    fn to_domain(self) -> CartLine {
        CartLine {
            key: self.cart_id,
            product_id: ProductId(self.product_id),
            name: self.name,
            quantity: self.quantity.max(0) as u32,
            unit_price: self.price,
            line_total: self.total,
        }
    }
}

#[derive(Deserialize)]
struct MethodRecord {
    code: String,
    #[serde(default)]
    title: String,
}

impl MethodRecord {
    fn to_domain(self) -> CheckoutMethod {
        CheckoutMethod {
            code: self.code,
            title: self.title,
        }
    }
}

#[derive(Deserialize)]
struct ShippingGroupRecord {
    #[serde(default, deserialize_with = "map_values")]
    quote: Vec<MethodRecord>,
}

#[derive(Deserialize)]
struct ShippingMethodsRecord {
    #[serde(default, deserialize_with = "map_values")]
    shipping_methods: Vec<ShippingGroupRecord>,
}

#[derive(Deserialize)]
struct PaymentMethodsRecord {
    #[serde(default, deserialize_with = "map_values")]
    payment_methods: Vec<MethodRecord>,
}

#[derive(Deserialize)]
struct OrderAddRecord {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    order_id: Option<i64>,
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    lenient_i64(deserializer).map(Some)
}

#[derive(Deserialize)]
struct OrderInfoRecord {
    order: OrderRecord,
}

#[derive(Deserialize)]
struct OrderRecord {
    #[serde(deserialize_with = "lenient_i64")]
    order_id: i64,
    #[serde(deserialize_with = "lenient_money")]
    total: Money,
    #[serde(default)]
    telephone: Option<String>,
}

fn address_form(address: &Address) -> Vec<(&'static str, String)> {
    vec![
        ("firstname", address.firstname.clone()),
        ("lastname", address.lastname.clone()),
        ("address_1", address.address_1.clone()),
        ("city", address.city.clone()),
        ("country_id", address.country_id.clone()),
        ("zone_id", address.zone_id.clone()),
    ]
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl Authenticator for OpenCartAdapter {
    #[instrument(skip(self))]
    async fn login(&self) -> Result<Credential, AuthFailure> {
        let form = [
            ("username", self.username.clone()),
            ("key", self.api_key.clone()),
        ];
        let body = self
            .post("login", None, &[], &form)
            .await
            .map_err(|e| AuthFailure(e.to_string()))?;
        let value = decode_body(&body).map_err(|e| AuthFailure(e.to_string()))?;
        if value.as_array().is_some_and(|items| items.is_empty()) {
            return Err(AuthFailure("empty login response".to_string()));
        }
        let record: LoginRecord = serde_json::from_value(value)
            .map_err(|e| AuthFailure(format!("unexpected login response: {}", e)))?;
        match record.api_token {
            Some(token) if !token.is_empty() => Ok(Credential::new(token)),
            _ => Err(AuthFailure("login response carried no api_token".to_string())),
        }
    }
}

#[async_trait]
impl CommerceGateway for OpenCartAdapter {
    async fn add_to_cart(
        &self,
        credential: &Credential,
        product: ProductId,
        quantity: u32,
    ) -> GatewayResult<()> {
        let form = [
            ("product_id", product.0.to_string()),
            ("quantity", quantity.to_string()),
        ];
        self.call::<Value>("cart/add", credential, &form).await?;
        Ok(())
    }

    async fn remove_from_cart(&self, credential: &Credential, line_key: &str) -> GatewayResult<()> {
        self.call::<Value>("cart/remove", credential, &[("key", line_key.to_string())])
            .await?;
        Ok(())
    }

    async fn read_cart(&self, credential: &Credential) -> GatewayResult<Cart> {
        let record: CartRecord = self.call("cart/products", credential, &[]).await?;
        Ok(Cart {
            lines: record
                .products
                .into_iter()
                .map(CartProductRecord::to_domain)
                .collect(),
        })
    }

    async fn set_shipping_address(
        &self,
        credential: &Credential,
        address: &Address,
    ) -> GatewayResult<()> {
        self.call::<Value>("shipping/address", credential, &address_form(address))
            .await?;
        Ok(())
    }

    async fn list_shipping_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>> {
        let record: ShippingMethodsRecord = self.call("shipping/methods", credential, &[]).await?;
        Ok(record
            .shipping_methods
            .into_iter()
            .flat_map(|group| group.quote)
            .map(MethodRecord::to_domain)
            .collect())
    }

    async fn set_shipping_method(&self, credential: &Credential, code: &str) -> GatewayResult<()> {
        self.call::<Value>(
            "shipping/method",
            credential,
            &[("shipping_method", code.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn set_payment_address(
        &self,
        credential: &Credential,
        address: &Address,
    ) -> GatewayResult<()> {
        self.call::<Value>("payment/address", credential, &address_form(address))
            .await?;
        Ok(())
    }

    async fn list_payment_methods(
        &self,
        credential: &Credential,
    ) -> GatewayResult<Vec<CheckoutMethod>> {
        let record: PaymentMethodsRecord = self.call("payment/methods", credential, &[]).await?;
        Ok(record
            .payment_methods
            .into_iter()
            .map(MethodRecord::to_domain)
            .collect())
    }

    async fn set_payment_method(&self, credential: &Credential, code: &str) -> GatewayResult<()> {
        self.call::<Value>(
            "payment/method",
            credential,
            &[("payment_method", code.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn set_customer(
        &self,
        credential: &Credential,
        customer: &Customer,
    ) -> GatewayResult<()> {
        let form = [
            ("firstname", customer.firstname.clone()),
            ("lastname", customer.lastname.clone()),
            ("email", customer.email.clone()),
            ("telephone", customer.telephone.clone()),
        ];
        self.call::<Value>("customer", credential, &form).await?;
        Ok(())
    }

    async fn submit_order(&self, credential: &Credential) -> GatewayResult<OrderId> {
        let record: OrderAddRecord = self.call("order/add", credential, &[]).await?;
        record.order_id.map(OrderId).ok_or_else(|| {
            GatewayError::BackendUnavailable("order/add returned no order_id".to_string())
        })
    }

    async fn read_order(
        &self,
        credential: &Credential,
        order: OrderId,
    ) -> GatewayResult<OrderDetails> {
        let body = self
            .post(
                "order/info",
                Some(credential),
                &[("order_id", order.0.to_string())],
                &[],
            )
            .await?;
        let record: OrderInfoRecord = decode(&body)?;
        Ok(OrderDetails {
            id: OrderId(record.order.order_id),
            total: record.order.total,
            telephone: record.order.telephone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_body_after_php_notice() {
        let raw = "<b>Notice</b>: Undefined index: foo in <b>/var/www/cart.php</b>{\"success\":\"ok\"}";
        assert_eq!(decode_body(raw).unwrap(), json!({"success": "ok"}));

        let with_break = "<br />\n<b>Warning</b>: session_start() in <b>/var/www/startup.php</b> on line <b>42</b><br />\n{\"api_token\":\"abc\"}";
        assert_eq!(decode_body(with_break).unwrap(), json!({"api_token": "abc"}));
    }

    #[test]
    fn permission_warning_is_session_invalid() {
        let raw = r#"{"error":{"warning":"Warning: You do not have permission to access the API!"}}"#;
        assert_eq!(decode_body(raw), Err(GatewayError::SessionInvalid));
    }

    #[test]
    fn other_errors_are_rejections() {
        let raw = r#"{"error":{"store":"Products marked with *** are not available!"}}"#;
        assert_eq!(
            decode_body(raw),
            Err(GatewayError::Rejected(
                "Products marked with *** are not available!".to_string()
            ))
        );
        assert!(matches!(
            decode_body(r#"{"error":"Warning: order could not be found!"}"#),
            Err(GatewayError::Rejected(_))
        ));
    }

    #[test]
    fn empty_error_field_is_not_a_failure() {
        assert!(decode_body(r#"{"error":[],"success":"ok"}"#).is_ok());
    }

    #[test]
    fn malformed_body_is_backend_unavailable() {
        assert!(matches!(
            decode_body("<html>502 Bad Gateway</html>"),
            Err(GatewayError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn cart_fields_accept_strings_and_numbers() {
        let raw = r#"{"products":[
            {"cart_id":"5","product_id":"12","name":"Latte","quantity":"2","price":"180.00р.","total":"360.00р."},
            {"cart_id":6,"product_id":7,"name":"Bun","quantity":1,"price":1200.5,"total":"1 200.50р."}
        ]}"#;
        let record: CartRecord = decode(raw).unwrap();
        let lines: Vec<CartLine> = record
            .products
            .into_iter()
            .map(CartProductRecord::to_domain)
            .collect();
        assert_eq!(lines[0].key, "5");
        assert_eq!(lines[0].product_id, ProductId(12));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].line_total, Money::from_major(360));
        assert_eq!(lines[1].key, "6");
        assert_eq!(lines[1].unit_price, Money::from_minor(120_050));
        assert_eq!(lines[1].line_total, Money::from_minor(120_050));
    }

    #[test]
    fn method_lists_tolerate_php_empty_arrays() {
        let none: ShippingMethodsRecord = decode(r#"{"shipping_methods":[]}"#).unwrap();
        assert!(none.shipping_methods.is_empty());

        let some: ShippingMethodsRecord = decode(
            r#"{"shipping_methods":{"pickup":{"title":"Pickup","quote":{"pickup":{"code":"pickup.pickup","title":"Pickup From Store"}}}}}"#,
        )
        .unwrap();
        let codes: Vec<String> = some
            .shipping_methods
            .into_iter()
            .flat_map(|g| g.quote)
            .map(|m| m.code)
            .collect();
        assert_eq!(codes, ["pickup.pickup"]);
    }

    #[test]
    fn order_info_parses_backend_total() {
        let record: OrderInfoRecord =
            decode(r#"{"order":{"order_id":"77","total":"360.0000","telephone":"+79123456789"}}"#)
                .unwrap();
        assert_eq!(record.order.order_id, 77);
        assert_eq!(record.order.total, Money::from_major(360));
    }
}
