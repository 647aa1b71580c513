//! services/bot/src/engine/error.rs
//!
//! The failures a single inbound event can end in. Every variant leaves the stored
//! conversation state untouched and is answered with a user-visible message.

use crate::engine::saga::SagaStep;
use shop_bot_core::ports::{AuthFailure, GatewayError, PortError};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The login exchange failed; nothing can be done for this event.
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// A backend call failed and the one-shot token refresh did not help.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A saga step failed after the refresh retry. The order may or may not exist.
    #[error("order placement failed at {step}: {source}")]
    OrderPlacementFailed {
        step: SagaStep,
        #[source]
        source: GatewayError,
    },

    /// The user typed something unusable; the payload is the re-prompt to send.
    #[error("invalid user input: {0}")]
    InvalidUserInput(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl FlowError {
    /// Text shown to the user when this error ends an event.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Auth(_) => {
                "The shop is temporarily unavailable. Please try again in a minute.".to_string()
            }
            FlowError::Gateway(GatewayError::Rejected(reason)) => {
                format!("The shop could not do that: {}", reason)
            }
            FlowError::Gateway(_) => {
                "We could not reach the shop. Please try again.".to_string()
            }
            FlowError::OrderPlacementFailed { .. } => {
                "We could not place your order. Please press the button again to retry.".to_string()
            }
            FlowError::InvalidUserInput(prompt) => prompt.clone(),
            FlowError::Port(PortError::NotFound(_)) => {
                "That item is no longer available. Send /start to see the menu.".to_string()
            }
            FlowError::Port(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
