//! Proof of key possession for directory registration
//!
//! A registrant signs `"register:{user_id}:{public_key}"` (the wire form of
//! the key being registered) with the matching private key.

use crate::crypto::signing::{sign_message, verify_message};
use crate::crypto::{Identity, PublicKey};
use crate::error::Result;

/// Statement covered by a registration proof
pub fn registration_statement(user_id: &str, public_key_wire: &str) -> String {
    format!("register:{}:{}", user_id, public_key_wire)
}

/// Prove possession of `identity`'s private key for its own registration.
///
/// Returns `(public_key_wire, proof)`.
pub fn prove_registration(identity: &Identity) -> Result<(String, Vec<u8>)> {
    let wire = identity.public_key().to_wire()?;
    let proof = sign_message(
        registration_statement(identity.user_id(), &wire).as_bytes(),
        identity,
    )?;
    Ok((wire, proof))
}

/// Check a registration proof against the key being registered
pub fn verify_registration(
    user_id: &str,
    public_key_wire: &str,
    proof: &[u8],
    public_key: &PublicKey,
) -> Result<()> {
    verify_message(
        registration_statement(user_id, public_key_wire).as_bytes(),
        proof,
        public_key,
    )
}
