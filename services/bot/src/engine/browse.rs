//! services/bot/src/engine/browse.rs
//!
//! Catalog, product and cart screens.

use shop_bot_core::domain::{Cart, ConversationState, OutgoingMessage, ProductId};
use shop_bot_core::pagination::{page_count, page_slice, wrap_page};
use tracing::{debug, info, warn};

use crate::engine::callback::Action;
use crate::engine::conversation::{use_buttons, ConversationEngine, Input, Turn};
use crate::engine::error::FlowResult;
use crate::engine::render;

impl ConversationEngine {
    pub(crate) async fn on_browsing(&self, turn: &mut Turn, input: Input) -> FlowResult<()> {
        match input {
            Input::Action(Action::Page(requested)) => self.show_page(turn, requested).await,
            Input::Action(Action::Menu) => {
                let page = current_page(turn);
                self.show_page(turn, page).await
            }
            Input::Action(Action::Product(id)) => self.show_product(turn, id).await,
            Input::Action(Action::Cart) => self.show_cart(turn).await,
            _ => Err(use_buttons()),
        }
    }

    pub(crate) async fn on_product_detail(&self, turn: &mut Turn, input: Input) -> FlowResult<()> {
        match input {
            Input::Action(Action::Add { product, quantity }) => {
                let gateway = &self.deps.gateway;
                self.deps
                    .credentials
                    .call(|credential| async move {
                        gateway.add_to_cart(&credential, product, quantity).await
                    })
                    .await?;
                info!(product = %product, quantity, "Added to cart.");
                turn.alert = Some(format!("Added {} to your cart.", quantity));
                self.show_product(turn, product).await
            }
            Input::Action(Action::Cart) => self.show_cart(turn).await,
            Input::Action(Action::Back) => {
                let page = current_page(turn);
                self.show_page(turn, page).await
            }
            _ => Err(use_buttons()),
        }
    }

    pub(crate) async fn on_cart_view(&self, turn: &mut Turn, input: Input) -> FlowResult<()> {
        match input {
            Input::Action(Action::Remove(key)) => {
                let gateway = &self.deps.gateway;
                let line_key = key.as_str();
                self.deps
                    .credentials
                    .call(|credential| async move {
                        gateway.remove_from_cart(&credential, line_key).await
                    })
                    .await?;
                debug!(line = %key, "Removed cart line.");
                self.show_cart(turn).await
            }
            Input::Action(Action::Checkout) => {
                let cart = self.read_cart().await?;
                if cart.is_empty() {
                    return self.show_empty_cart(turn).await;
                }
                self.discard_origin(turn).await;
                turn.session.reset_checkout();
                self.send(turn, &OutgoingMessage::text(render::PHONE_PROMPT))
                    .await?;
                turn.session.state = ConversationState::AwaitingPhone;
                Ok(())
            }
            Input::Action(Action::Menu) | Input::Action(Action::Back) => {
                let page = current_page(turn);
                self.show_page(turn, page).await
            }
            _ => Err(use_buttons()),
        }
    }

    /// Renders catalog page `requested`, wrapped into range, and moves to `BROWSING`.
    pub(crate) async fn show_page(&self, turn: &mut Turn, requested: i64) -> FlowResult<()> {
        let products = self
            .deps
            .catalog
            .list_products(self.settings.catalog_category)
            .await?;
        let per_page = self.settings.products_per_page;
        let count = page_count(products.len(), per_page);
        let page = wrap_page(requested, count);
        let shown = page_slice(&products, page, per_page);

        self.discard_origin(turn).await;
        self.send(turn, &render::catalog_page(shown, page, count))
            .await?;
        turn.session.page = page;
        turn.session.product = None;
        turn.session.state = ConversationState::Browsing;
        Ok(())
    }

    pub(crate) async fn show_product(&self, turn: &mut Turn, id: ProductId) -> FlowResult<()> {
        let product = self.deps.catalog.get_product(id).await?;
        let in_cart = self.read_cart().await?.quantity_of(id);
        let card = render::product_card(&product, in_cart);

        self.discard_origin(turn).await;
        let sent_photo = match &product.image_url {
            Some(url) => match self.deps.transport.send_photo(turn.chat, url, &card).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(product = %id, "Photo rejected, sending text only: {}", e);
                    false
                }
            },
            None => false,
        };
        if !sent_photo {
            self.send(turn, &card).await?;
        }
        turn.session.product = Some(id);
        turn.session.state = ConversationState::ProductDetail;
        Ok(())
    }

    /// Reads the cart fresh; an empty cart falls back to the catalog.
    pub(crate) async fn show_cart(&self, turn: &mut Turn) -> FlowResult<()> {
        let cart = self.read_cart().await?;
        if cart.is_empty() {
            return self.show_empty_cart(turn).await;
        }
        self.discard_origin(turn).await;
        self.send(turn, &render::cart_view(&cart)).await?;
        turn.session.state = ConversationState::CartView;
        Ok(())
    }

    async fn show_empty_cart(&self, turn: &mut Turn) -> FlowResult<()> {
        self.send(turn, &OutgoingMessage::text("Your cart is empty."))
            .await?;
        let page = current_page(turn);
        self.show_page(turn, page).await
    }

    pub(crate) async fn read_cart(&self) -> FlowResult<Cart> {
        let gateway = &self.deps.gateway;
        self.deps
            .credentials
            .call(|credential| async move { gateway.read_cart(&credential).await })
            .await
    }
}

fn current_page(turn: &Turn) -> i64 {
    turn.session.page.max(1) as i64
}
