//! services/bot/src/engine/saga.rs
//!
//! Order placement. The backend models checkout as mutations of its cart session, so
//! every prerequisite is set again before the final submit. There is no rollback and
//! no idempotency key: a retry after a transport failure can create a second order.

use shop_bot_core::domain::{
    Address, Cart, ChatId, CheckoutMethod, Credential, Customer, DeliveryChoice, OrderId,
};
use shop_bot_core::ports::{CommerceGateway, GatewayError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CheckoutDefaults;
use crate::engine::credentials::CredentialCache;
use crate::engine::error::{FlowError, FlowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    SetShippingAddress,
    ListShippingMethods,
    SetShippingMethod,
    SetPaymentAddress,
    ListPaymentMethods,
    SetPaymentMethod,
    SetCustomer,
    SubmitOrder,
}

impl SagaStep {
    /// Execution order.
    pub const SEQUENCE: [SagaStep; 8] = [
        SagaStep::SetShippingAddress,
        SagaStep::ListShippingMethods,
        SagaStep::SetShippingMethod,
        SagaStep::SetPaymentAddress,
        SagaStep::ListPaymentMethods,
        SagaStep::SetPaymentMethod,
        SagaStep::SetCustomer,
        SagaStep::SubmitOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::SetShippingAddress => "set_shipping_address",
            SagaStep::ListShippingMethods => "list_shipping_methods",
            SagaStep::SetShippingMethod => "set_shipping_method",
            SagaStep::SetPaymentAddress => "set_payment_address",
            SagaStep::ListPaymentMethods => "list_payment_methods",
            SagaStep::SetPaymentMethod => "set_payment_method",
            SagaStep::SetCustomer => "set_customer",
            SagaStep::SubmitOrder => "submit_order",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to turn the backend cart into an order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub chat: ChatId,
    pub cart: Cart,
    pub phone: String,
    pub delivery: DeliveryChoice,
}

pub struct OrderSaga {
    gateway: Arc<dyn CommerceGateway>,
    credentials: Arc<CredentialCache>,
    defaults: CheckoutDefaults,
}

impl OrderSaga {
    pub fn new(
        gateway: Arc<dyn CommerceGateway>,
        credentials: Arc<CredentialCache>,
        defaults: CheckoutDefaults,
    ) -> Self {
        Self {
            gateway,
            credentials,
            defaults,
        }
    }

    /// Runs every step against one credential. A `SessionInvalid` refreshes the token
    /// once and resumes from the failed step; any other failure, or a second
    /// `SessionInvalid`, aborts with `OrderPlacementFailed`.
    pub async fn place_order(&self, request: &OrderRequest) -> FlowResult<OrderId> {
        if request.cart.is_empty() {
            return Err(FlowError::InvalidUserInput(
                "Your cart is empty. Send /start to pick something first.".to_string(),
            ));
        }

        let mut credential = self.credentials.get_token().await?;
        let mut refreshed = false;
        let mut order_id = None;
        let mut index = 0;

        while index < SagaStep::SEQUENCE.len() {
            let step = SagaStep::SEQUENCE[index];
            match self.run_step(step, &credential, request).await {
                Ok(submitted) => {
                    debug!(%step, chat = %request.chat, "Saga step completed.");
                    if submitted.is_some() {
                        order_id = submitted;
                    }
                    index += 1;
                }
                Err(GatewayError::SessionInvalid) if !refreshed => {
                    warn!(
                        %step,
                        chat = %request.chat,
                        "Session rejected mid-checkout; refreshing and resuming."
                    );
                    refreshed = true;
                    credential = self.credentials.refresh(&credential).await?;
                }
                Err(source) => {
                    warn!(%step, chat = %request.chat, "Saga step failed: {}", source);
                    return Err(FlowError::OrderPlacementFailed { step, source });
                }
            }
        }

        self.credentials.mark_validated(&credential).await;
        let order_id = order_id.ok_or_else(|| FlowError::OrderPlacementFailed {
            step: SagaStep::SubmitOrder,
            source: GatewayError::BackendUnavailable("submit returned no order id".to_string()),
        })?;
        info!(order = %order_id, chat = %request.chat, "Order placed.");
        Ok(order_id)
    }

    async fn run_step(
        &self,
        step: SagaStep,
        credential: &Credential,
        request: &OrderRequest,
    ) -> Result<Option<OrderId>, GatewayError> {
        let gateway = &self.gateway;
        match step {
            SagaStep::SetShippingAddress => {
                gateway.set_shipping_address(credential, &self.address(request)).await?;
            }
            SagaStep::ListShippingMethods => {
                let methods = gateway.list_shipping_methods(credential).await?;
                let wanted = self.shipping_code(&request.delivery);
                if !offers_method(&methods, wanted) {
                    warn!(
                        code = wanted,
                        "Shipping method not among the listed ones; trying anyway."
                    );
                }
            }
            SagaStep::SetShippingMethod => {
                gateway
                    .set_shipping_method(credential, self.shipping_code(&request.delivery))
                    .await?;
            }
            SagaStep::SetPaymentAddress => {
                gateway.set_payment_address(credential, &self.address(request)).await?;
            }
            SagaStep::ListPaymentMethods => {
                let methods = gateway.list_payment_methods(credential).await?;
                debug!(count = methods.len(), "Payment methods listed.");
            }
            SagaStep::SetPaymentMethod => {
                gateway
                    .set_payment_method(credential, &self.defaults.payment_method_code)
                    .await?;
            }
            SagaStep::SetCustomer => {
                gateway.set_customer(credential, &self.customer(request)).await?;
            }
            SagaStep::SubmitOrder => {
                return gateway.submit_order(credential).await.map(Some);
            }
        }
        Ok(None)
    }

    fn shipping_code(&self, delivery: &DeliveryChoice) -> &str {
        match delivery {
            DeliveryChoice::Pickup { .. } => &self.defaults.pickup_shipping_code,
            DeliveryChoice::Courier { .. } => &self.defaults.courier_shipping_code,
        }
    }

    fn address(&self, request: &OrderRequest) -> Address {
        let address_1 = match &request.delivery {
            DeliveryChoice::Pickup { store } => format!("Pickup at {}", store),
            DeliveryChoice::Courier { destination, .. } => format!("Courier to {}", destination),
        };
        Address {
            firstname: self.defaults.firstname.clone(),
            lastname: request.chat.to_string(),
            address_1,
            city: self.defaults.city.clone(),
            country_id: self.defaults.country_id.clone(),
            zone_id: self.defaults.zone_id.clone(),
        }
    }

    fn customer(&self, request: &OrderRequest) -> Customer {
        Customer {
            firstname: self.defaults.firstname.clone(),
            lastname: request.chat.to_string(),
            email: self.defaults.email.clone(),
            telephone: request.phone.clone(),
        }
    }
}

/// OpenCart codes are `extension.option`; only the exact pair selects a method.
fn offers_method(methods: &[CheckoutMethod], code: &str) -> bool {
    methods.iter().any(|m| m.code == code)
}
