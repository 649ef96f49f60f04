//! Cryptographic primitives for Courier
//!
//! This module provides:
//! - `keys`: RSA-2048 identities and their PEM / wire encodings
//! - `wrap`: RSA-OAEP transport of the per-message symmetric key
//! - `cipher`: Triple-DES-CBC message encryption with PKCS#7 padding
//! - `signing`: SHA-256 digests and RSA-PSS signatures

pub mod cipher;
pub mod keys;
pub mod signing;
pub mod wrap;

pub use cipher::{decrypt_message, encrypt_message, SymmetricKey};
pub use keys::{Identity, PublicKey};
pub use signing::{
    auth_info, compute_digest, digests_match, sign_auth_info, sign_digest,
    verify_digest_signature, Digest,
};
pub use wrap::{unwrap_key, wrap_key};
