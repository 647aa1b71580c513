pub mod domain;
pub mod geo;
pub mod money;
pub mod pagination;
pub mod phone;
pub mod ports;

pub use domain::{
    Address, Button, Cart, CartLine, ChatId, CheckoutMethod, ConversationSession,
    ConversationState, Credential, Customer, DeliveryChoice, DeliveryOffer, InboundEvent,
    Invoice, MessageId, OrderDetails, OrderId, OutgoingMessage, PlacedOrder, Product, ProductId,
    ReplyMarkup, Store,
};
pub use geo::{Coordinates, DeliveryFees, DeliveryTier};
pub use money::Money;
pub use phone::{InvalidPhone, PhoneNumber};
pub use ports::{
    AuthFailure, Authenticator, Catalog, ChatTransport, CommerceGateway, GatewayError,
    GatewayResult, Geocoder, PortError, PortResult, StateStore, StoreDirectory,
};
