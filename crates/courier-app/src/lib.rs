//! Courier Application - client-side messaging logic
//!
//! Coordinates the crypto layer and the relay protocol.

pub mod client;
pub mod error;
pub mod messenger;

pub use client::{ClientConfig, RelayClient};
pub use error::{Error, Result};
pub use messenger::{Delivery, Messenger, Rejection};
