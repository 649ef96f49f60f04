//! Symmetric key transport
//!
//! The per-message Triple-DES key is wrapped with RSA-OAEP, SHA-256 as both
//! the label hash and the MGF1 hash, empty label.

use rand::rngs::OsRng;
use rsa::Oaep;
use sha2::Sha256;

use super::cipher::SymmetricKey;
use super::keys::{Identity, PublicKey};
use crate::error::{Error, Result};

/// Wrap a symmetric key for one recipient using RSA-OAEP
///
/// # Arguments
/// * `key` - Per-message Triple-DES key
/// * `recipient` - Recipient's public key (MGF1-SHA256, SHA-256, no label)
///
/// # Returns
/// The wrapped key, one modulus length long
pub fn wrap_key(key: &SymmetricKey, recipient: &PublicKey) -> Result<Vec<u8>> {
    wrap_bytes(key.as_bytes(), recipient)
}

fn wrap_bytes(bytes: &[u8], recipient: &PublicKey) -> Result<Vec<u8>> {
    recipient
        .rsa()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), bytes)
        .map_err(|e| Error::KeyWrap(e.to_string()))
}

/// Recover a wrapped key with the recipient's private key.
///
/// Every failure (wrong key, bad padding, truncated input, wrong unwrapped
/// length) maps to the same [`Error::KeyUnwrap`].
pub fn unwrap_key(wrapped: &[u8], recipient: &Identity) -> Result<SymmetricKey> {
    let bytes = zeroize::Zeroizing::new(
        recipient
            .private_key()
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| Error::KeyUnwrap)?,
    );
    SymmetricKey::from_slice(&bytes).map_err(|_| Error::KeyUnwrap)
}
