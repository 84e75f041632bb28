//! Core types for the Tradecast hub
//!
//! This crate defines the trade event exchanged with clients, the key it is
//! stored under, and the error types shared by the hub services.

pub mod error;
pub mod trade;

pub use error::{DecodeError, TransportError};
pub use trade::{TradeAction, TradeKey};
