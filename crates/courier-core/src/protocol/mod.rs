//! Protocol definitions for Courier
//!
//! Defines the envelope exchanged between identities, its wire encoding, and
//! the proof attached to directory registrations.

mod encoding;
pub mod envelope;
pub mod registration;

pub use envelope::{Envelope, KeyBlock, MessageBlock};
pub use registration::{prove_registration, registration_statement, verify_registration};
