//! services/bot/src/engine/mod.rs
//!
//! The ordering core: credential cache, order saga and the conversation state machine.

pub mod browse;
pub mod callback;
pub mod checkout;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod render;
pub mod saga;

pub use conversation::{ConversationEngine, EngineDeps, EngineSettings};
pub use credentials::CredentialCache;
pub use error::{FlowError, FlowResult};
pub use saga::{OrderRequest, OrderSaga, SagaStep};
