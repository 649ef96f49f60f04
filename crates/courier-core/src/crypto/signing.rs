//! Digests and RSA-PSS signatures
//!
//! Signatures are RSA-PSS with MGF1-SHA256 and the maximum salt length the
//! modulus allows. The signing primitive always hashes its input with
//! SHA-256 first, so signing a message digest produces a signature over
//! `SHA256(digest)`. Verifiers must apply the same double hash.

use chrono::Local;
use rand::rngs::OsRng;
use rsa::Pss;
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;

use super::keys::{Identity, PublicKey};
use crate::error::{Error, Result};

/// Size of a SHA-256 digest in bytes
pub const DIGEST_SIZE: usize = 32;

/// SHA-256 output
pub type Digest = [u8; DIGEST_SIZE];

/// Largest PSS salt for a modulus of `modulus_bits` with SHA-256:
/// `ceil((modBits - 1) / 8) - hLen - 2`.
pub fn max_salt_len(modulus_bits: usize) -> usize {
    let em_len = modulus_bits.saturating_sub(1).div_ceil(8);
    em_len.saturating_sub(DIGEST_SIZE + 2)
}

/// `SHA256(iv || ciphertext)`
pub fn compute_digest(iv: &[u8], ciphertext: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(iv);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// Constant-time digest comparison; a length mismatch is simply unequal
pub fn digests_match(expected: &[u8], received: &[u8]) -> bool {
    expected.ct_eq(received).into()
}

/// Build the `"{sender_id}:{timestamp}"` string that accompanies each key
/// block, timestamped in local ISO-8601 with microseconds.
pub fn auth_info(sender_id: &str) -> String {
    format!(
        "{}:{}",
        sender_id,
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f")
    )
}

/// Sign the auth-info string
pub fn sign_auth_info(auth_info: &str, signer: &Identity) -> Result<Vec<u8>> {
    sign_message(auth_info.as_bytes(), signer)
}

/// Sign a message digest with RSA-PSS
///
/// # Arguments
/// * `digest` - Output of [`compute_digest`]
/// * `signer` - Sender identity
///
/// # Returns
/// PSS signature (MGF1-SHA256, maximum salt) over `SHA256(digest)`
pub fn sign_digest(digest: &[u8], signer: &Identity) -> Result<Vec<u8>> {
    sign_message(digest, signer)
}

/// Verify a signature produced by [`sign_digest`]
pub fn verify_digest_signature(digest: &[u8], signature: &[u8], signer: &PublicKey) -> Result<()> {
    verify_message(digest, signature, signer)
}

/// PSS-sign `message`, hashing it with SHA-256 first
pub(crate) fn sign_message(message: &[u8], signer: &Identity) -> Result<Vec<u8>> {
    let hashed = Sha256::digest(message);
    let salt_len = max_salt_len(signer.public_key().bits());
    signer
        .private_key()
        .sign_with_rng(&mut OsRng, Pss::new_with_salt::<Sha256>(salt_len), &hashed)
        .map_err(|e| Error::Signing(e.to_string()))
}

/// Verify a PSS signature over `SHA256(message)`
pub(crate) fn verify_message(message: &[u8], signature: &[u8], signer: &PublicKey) -> Result<()> {
    let hashed = Sha256::digest(message);
    let salt_len = max_salt_len(signer.bits());
    signer
        .rsa()
        .verify(Pss::new_with_salt::<Sha256>(salt_len), &hashed, signature)
        .map_err(|_| Error::SignatureInvalid)
}
