//! services/bot/src/engine/render.rs
//!
//! Turns domain values into outgoing messages and keyboards. Pure; no I/O.

use shop_bot_core::domain::{
    Button, Cart, DeliveryOffer, OutgoingMessage, PlacedOrder, Product, ReplyMarkup,
};
use shop_bot_core::geo::DeliveryTier;
use shop_bot_core::money::Money;
use shop_bot_core::phone::PhoneNumber;
use shop_bot_core::ChatId;

use crate::engine::callback::Action;

pub const USE_BUTTONS: &str = "Please use the buttons provided.";
pub const PHONE_PROMPT: &str =
    "Please send the phone number we can reach you at, e.g. +7 912 345-67-89.";
pub const LOCATION_PROMPT: &str =
    "Where should we deliver? Share your location or type the address.";

fn price(amount: Money) -> String {
    format!("{} ₽", amount)
}

fn row(buttons: impl IntoIterator<Item = (String, Action)>) -> Vec<Button> {
    buttons
        .into_iter()
        .map(|(label, action)| Button::new(label, action.encode()))
        .collect()
}

/// One catalog page: a button per product, then navigation and the cart.
pub fn catalog_page(products: &[Product], page: usize, page_count: usize) -> OutgoingMessage {
    let mut keyboard: Vec<Vec<Button>> = products
        .iter()
        .map(|p| {
            row([(
                format!("{} · {}", p.name, price(p.price)),
                Action::Product(p.id),
            )])
        })
        .collect();

    if page_count > 1 {
        let page = page as i64;
        keyboard.push(row([
            ("«".to_string(), Action::Page(page - 1)),
            (format!("{}/{}", page, page_count), Action::Page(page)),
            ("»".to_string(), Action::Page(page + 1)),
        ]));
    }
    keyboard.push(row([("🛒 Cart".to_string(), Action::Cart)]));

    let text = if products.is_empty() {
        "The menu is empty right now.".to_string()
    } else {
        "Please choose:".to_string()
    };
    OutgoingMessage::text(text).with_markup(ReplyMarkup::Inline(keyboard))
}

/// Product card. `in_cart` is what a fresh cart read reported for this product.
pub fn product_card(product: &Product, in_cart: u32) -> OutgoingMessage {
    let mut text = format!("{}\n{}", product.name, price(product.price));
    let description = strip_html(&product.description);
    if !description.is_empty() {
        text.push_str("\n\n");
        text.push_str(&description);
    }
    if in_cart > 0 {
        text.push_str(&format!("\n\nIn your cart: {}", in_cart));
    }

    let adds = (1..=3).map(|quantity| {
        (
            format!("+{}", quantity),
            Action::Add {
                product: product.id,
                quantity,
            },
        )
    });
    let keyboard = vec![
        row(adds),
        row([
            ("🛒 Cart".to_string(), Action::Cart),
            ("« Back".to_string(), Action::Back),
        ]),
    ];
    OutgoingMessage::text(text).with_markup(ReplyMarkup::Inline(keyboard))
}

/// Lists the backend's cart lines; the total is the sum of their line totals.
pub fn cart_view(cart: &Cart) -> OutgoingMessage {
    let mut text = String::from("Your cart:\n");
    for line in &cart.lines {
        text.push_str(&format!(
            "\n{} × {} = {}",
            line.name,
            line.quantity,
            price(line.line_total)
        ));
    }
    text.push_str(&format!("\n\nTotal: {}", price(cart.total())));

    let mut keyboard: Vec<Vec<Button>> = cart
        .lines
        .iter()
        .map(|line| {
            row([(
                format!("✖ {}", line.name),
                Action::Remove(line.key.clone()),
            )])
        })
        .collect();
    keyboard.push(row([("Checkout".to_string(), Action::Checkout)]));
    keyboard.push(row([("« Menu".to_string(), Action::Menu)]));
    OutgoingMessage::text(text).with_markup(ReplyMarkup::Inline(keyboard))
}

pub fn phone_confirmation(phone: &PhoneNumber) -> OutgoingMessage {
    OutgoingMessage::text(format!("Is {} correct?", phone.international())).with_markup(
        ReplyMarkup::Inline(vec![row([
            ("Yes".to_string(), Action::ConfirmPhone),
            ("No".to_string(), Action::RejectPhone),
        ])]),
    )
}

pub fn location_request() -> OutgoingMessage {
    OutgoingMessage::text(LOCATION_PROMPT).with_markup(ReplyMarkup::RequestLocation {
        label: "📍 Share location".to_string(),
    })
}

/// The nearest store and what courier delivery from it costs.
pub fn delivery_offer(offer: &DeliveryOffer) -> OutgoingMessage {
    let distance = if offer.distance_km < 1.0 {
        format!("{:.0} m", offer.distance_km * 1000.0)
    } else {
        format!("{:.1} km", offer.distance_km)
    };
    let courier_terms = match offer.tier {
        DeliveryTier::Free => "Courier delivery is free.".to_string(),
        _ => format!("Courier delivery costs {}.", price(offer.fee)),
    };
    let text = format!(
        "The nearest store is {}, {} away. You can pick the order up there.\n{}",
        offer.store, distance, courier_terms
    );
    OutgoingMessage::text(text).with_markup(ReplyMarkup::Inline(vec![row([
        ("Pickup".to_string(), Action::Pickup),
        ("Courier".to_string(), Action::Courier),
    ])]))
}

pub fn order_placed(order: &PlacedOrder, online_payment: bool) -> OutgoingMessage {
    let mut buttons = Vec::new();
    if online_payment {
        buttons.push(("Pay online".to_string(), Action::PayOnline));
    }
    buttons.push(("Pay on delivery".to_string(), Action::PayCash));
    OutgoingMessage::text(format!(
        "Order #{} placed. Total: {}.\nHow would you like to pay?",
        order.id,
        price(order.total)
    ))
    .with_markup(ReplyMarkup::Inline(vec![row(buttons)]))
}

/// What the courier receives for a courier-delivered order.
pub fn courier_summary(
    order: &PlacedOrder,
    cart: &Cart,
    phone: &str,
    customer: ChatId,
) -> OutgoingMessage {
    let mut text = format!("New delivery: order #{}\n", order.id);
    for line in &cart.lines {
        text.push_str(&format!("\n{} × {}", line.name, line.quantity));
    }
    text.push_str(&format!(
        "\n\nTotal: {}\nPhone: {}\nCustomer chat: {}",
        price(order.total),
        phone,
        customer
    ));
    OutgoingMessage::text(text)
}

/// Plain text from the HTML product descriptions the shop stores. OpenCart keeps them
/// entity-encoded, so entities are decoded before tags are dropped.
pub fn strip_html(raw: &str) -> String {
    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    let mut out = String::with_capacity(decoded.len());
    let mut in_tag = false;
    for c in decoded.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
