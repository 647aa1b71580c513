//! services/bot/src/engine/callback.rs
//!
//! Callback data carried by inline buttons. Telegram caps it at 64 bytes, so every
//! action is a short `prefix[:arg[:arg]]` string.

use shop_bot_core::domain::ProductId;

pub const PAGE_PREFIX: &str = "page";
pub const PRODUCT_PREFIX: &str = "product";
pub const ADD_PREFIX: &str = "add";
pub const REMOVE_PREFIX: &str = "remove";
pub const CART: &str = "cart";
pub const BACK: &str = "back";
pub const MENU: &str = "menu";
pub const CHECKOUT: &str = "checkout";
pub const PHONE_YES: &str = "phone:yes";
pub const PHONE_NO: &str = "phone:no";
pub const PICKUP: &str = "pickup";
pub const COURIER: &str = "courier";
pub const PAY_ONLINE: &str = "pay:online";
pub const PAY_CASH: &str = "pay:cash";

/// A decoded button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Requested catalog page, possibly out of range; wrapped by the caller.
    Page(i64),
    Product(ProductId),
    Add { product: ProductId, quantity: u32 },
    Remove(String),
    Cart,
    Back,
    Menu,
    Checkout,
    ConfirmPhone,
    RejectPhone,
    Pickup,
    Courier,
    PayOnline,
    PayCash,
}

impl Action {
    /// Returns `None` for data no button of ours produces.
    pub fn parse(data: &str) -> Option<Action> {
        match data {
            CART => return Some(Action::Cart),
            BACK => return Some(Action::Back),
            MENU => return Some(Action::Menu),
            CHECKOUT => return Some(Action::Checkout),
            PHONE_YES => return Some(Action::ConfirmPhone),
            PHONE_NO => return Some(Action::RejectPhone),
            PICKUP => return Some(Action::Pickup),
            COURIER => return Some(Action::Courier),
            PAY_ONLINE => return Some(Action::PayOnline),
            PAY_CASH => return Some(Action::PayCash),
            _ => {}
        }

        let (prefix, rest) = data.split_once(':')?;
        match prefix {
            PAGE_PREFIX => rest.parse().ok().map(Action::Page),
            PRODUCT_PREFIX => rest.parse().ok().map(|id| Action::Product(ProductId(id))),
            ADD_PREFIX => {
                let (id, quantity) = rest.split_once(':')?;
                let quantity: u32 = quantity.parse().ok()?;
                if quantity == 0 {
                    return None;
                }
                Some(Action::Add {
                    product: ProductId(id.parse().ok()?),
                    quantity,
                })
            }
            REMOVE_PREFIX if !rest.is_empty() => Some(Action::Remove(rest.to_string())),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Action::Page(page) => format!("{PAGE_PREFIX}:{page}"),
            Action::Product(id) => format!("{PRODUCT_PREFIX}:{id}"),
            Action::Add { product, quantity } => format!("{ADD_PREFIX}:{product}:{quantity}"),
            Action::Remove(key) => format!("{REMOVE_PREFIX}:{key}"),
            Action::Cart => CART.to_string(),
            Action::Back => BACK.to_string(),
            Action::Menu => MENU.to_string(),
            Action::Checkout => CHECKOUT.to_string(),
            Action::ConfirmPhone => PHONE_YES.to_string(),
            Action::RejectPhone => PHONE_NO.to_string(),
            Action::Pickup => PICKUP.to_string(),
            Action::Courier => COURIER.to_string(),
            Action::PayOnline => PAY_ONLINE.to_string(),
            Action::PayCash => PAY_CASH.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameterised_actions() {
        assert_eq!(Action::parse("page:0"), Some(Action::Page(0)));
        assert_eq!(Action::parse("page:-1"), Some(Action::Page(-1)));
        assert_eq!(Action::parse("product:12"), Some(Action::Product(ProductId(12))));
        assert_eq!(
            Action::parse("add:12:2"),
            Some(Action::Add {
                product: ProductId(12),
                quantity: 2
            })
        );
        assert_eq!(
            Action::parse("remove:MTI6W10="),
            Some(Action::Remove("MTI6W10=".to_string()))
        );
    }

    #[test]
    fn parses_fixed_actions() {
        assert_eq!(Action::parse("cart"), Some(Action::Cart));
        assert_eq!(Action::parse("phone:yes"), Some(Action::ConfirmPhone));
        assert_eq!(Action::parse("pay:cash"), Some(Action::PayCash));
    }

    #[test]
    fn rejects_unknown_or_malformed_data() {
        for data in ["", "page", "page:x", "add:12", "add:12:0", "remove:", "order:5", "pay:card"] {
            assert_eq!(Action::parse(data), None, "{data:?} should not parse");
        }
    }

    #[test]
    fn encoded_buttons_parse_back() {
        let add = Action::Add {
            product: ProductId(7),
            quantity: 3,
        };
        assert_eq!(Action::parse(&add.encode()), Some(add));
        assert_eq!(Action::parse(&Action::Page(4).encode()), Some(Action::Page(4)));
    }
}
