mod common;

use bot_lib::config::CheckoutDefaults;
use bot_lib::engine::{CredentialCache, FlowError, OrderRequest, OrderSaga, SagaStep};
use common::{central, sample_products, FakeBackend, COURIER, CUSTOMER};
use shop_bot_core::domain::{Cart, DeliveryChoice, OrderId, ProductId};
use shop_bot_core::money::Money;
use shop_bot_core::ports::{CommerceGateway, GatewayError};
use std::sync::Arc;

struct Fixture {
    backend: Arc<FakeBackend>,
    credentials: Arc<CredentialCache>,
    saga: OrderSaga,
}

async fn fixture_with_cart() -> (Fixture, Cart) {
    let backend = Arc::new(FakeBackend::new(&sample_products()));
    let credentials = Arc::new(CredentialCache::new(backend.clone()));
    let saga = OrderSaga::new(
        backend.clone(),
        credentials.clone(),
        CheckoutDefaults::default(),
    );

    let credential = credentials.get_token().await.unwrap();
    backend
        .add_to_cart(&credential, ProductId(12), 2)
        .await
        .unwrap();
    let cart = backend.read_cart(&credential).await.unwrap();

    (
        Fixture {
            backend,
            credentials,
            saga,
        },
        cart,
    )
}

fn pickup(cart: Cart) -> OrderRequest {
    OrderRequest {
        chat: CUSTOMER,
        cart,
        phone: "+79123456789".to_string(),
        delivery: DeliveryChoice::Pickup {
            store: "Central".to_string(),
        },
    }
}

const STEPS: [&str; 8] = [
    "set_shipping_address",
    "list_shipping_methods",
    "set_shipping_method",
    "set_payment_address",
    "list_payment_methods",
    "set_payment_method",
    "set_customer",
    "submit_order",
];

fn saga_calls(backend: &FakeBackend) -> Vec<String> {
    backend
        .calls()
        .into_iter()
        .filter(|c| STEPS.contains(&c.as_str()))
        .collect()
}

#[tokio::test]
async fn runs_every_step_in_order() {
    let (f, cart) = fixture_with_cart().await;

    let order = f.saga.place_order(&pickup(cart)).await.unwrap();

    assert_eq!(order, OrderId(101));
    assert_eq!(saga_calls(&f.backend), STEPS);
    assert_eq!(f.backend.shipping_method().as_deref(), Some("pickup.pickup"));

    let customer = f.backend.customer().unwrap();
    assert_eq!(customer.telephone, "+79123456789");
    assert_eq!(customer.lastname, CUSTOMER.to_string());
    assert!(f.backend.cart_lines().is_empty());
}

#[tokio::test]
async fn session_invalid_mid_saga_resumes_from_the_failed_step() {
    let (f, cart) = fixture_with_cart().await;
    f.backend
        .fail_once("set_shipping_method", GatewayError::SessionInvalid);

    let order = f.saga.place_order(&pickup(cart)).await;

    assert_eq!(order.unwrap(), OrderId(101));
    assert_eq!(f.backend.login_attempts(), 2);
    assert_eq!(f.backend.count("set_shipping_address"), 1);
    assert_eq!(f.backend.count("list_shipping_methods"), 1);
    assert_eq!(f.backend.count("set_shipping_method"), 2);
    assert_eq!(f.backend.count("submit_order"), 1);
    assert_eq!(f.credentials.peek().await.unwrap().token, "token-2");
}

#[tokio::test]
async fn second_session_invalid_aborts_the_saga() {
    let (f, cart) = fixture_with_cart().await;
    f.backend
        .fail_once("set_payment_address", GatewayError::SessionInvalid);
    f.backend
        .fail_once("set_payment_address", GatewayError::SessionInvalid);

    let result = f.saga.place_order(&pickup(cart)).await;

    match result {
        Err(FlowError::OrderPlacementFailed { step, source }) => {
            assert_eq!(step, SagaStep::SetPaymentAddress);
            assert_eq!(source, GatewayError::SessionInvalid);
        }
        other => panic!("expected OrderPlacementFailed, got {:?}", other),
    }
    assert_eq!(f.backend.count("submit_order"), 0);
}

#[tokio::test]
async fn transport_failure_names_the_failed_step() {
    let (f, cart) = fixture_with_cart().await;
    f.backend.fail_once(
        "set_payment_method",
        GatewayError::BackendUnavailable("connection reset".to_string()),
    );

    let result = f.saga.place_order(&pickup(cart)).await;

    assert!(matches!(
        result,
        Err(FlowError::OrderPlacementFailed {
            step: SagaStep::SetPaymentMethod,
            source: GatewayError::BackendUnavailable(_),
        })
    ));
    assert_eq!(f.backend.login_attempts(), 1);
    assert_eq!(f.backend.count("set_customer"), 0);
    assert_eq!(f.backend.count("submit_order"), 0);
}

#[tokio::test]
async fn empty_cart_is_refused_before_any_call() {
    let (f, _) = fixture_with_cart().await;
    let before = f.backend.calls().len();

    let result = f.saga.place_order(&pickup(Cart::default())).await;

    assert!(matches!(result, Err(FlowError::InvalidUserInput(_))));
    assert_eq!(f.backend.calls().len(), before);
}

#[tokio::test]
async fn courier_orders_use_the_courier_shipping_code() {
    let (f, cart) = fixture_with_cart().await;
    let request = OrderRequest {
        delivery: DeliveryChoice::Courier {
            store: "Central".to_string(),
            courier: Some(COURIER),
            destination: central(),
            fee: Money::from_major(100),
        },
        ..pickup(cart)
    };

    f.saga.place_order(&request).await.unwrap();

    assert_eq!(f.backend.shipping_method().as_deref(), Some("flat.flat"));
    let address = f.backend.shipping_address().unwrap();
    assert!(address.address_1.starts_with("Courier to "));
}
