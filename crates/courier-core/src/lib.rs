//! Courier Core - Cryptographic primitives and envelope protocol
//!
//! This crate provides the end-to-end security layer for Courier:
//! - RSA-2048 identities (PEM / base64 wire encoding)
//! - RSA-OAEP (SHA-256) wrapping of per-message Triple-DES keys
//! - Triple-DES-CBC message encryption with PKCS#7 padding
//! - SHA-256 digests signed with RSA-PSS
//! - Envelope construction and the ordered opening pipeline

pub mod crypto;
pub mod error;
pub mod protocol;

pub use crypto::{Identity, PublicKey};
pub use error::{Error, RejectionReason, Result};
pub use protocol::Envelope;
