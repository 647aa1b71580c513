//! services/bot/src/lib.rs
//!
//! The ordering bot service: conversation engine, adapters and webhook ingress.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod web;
