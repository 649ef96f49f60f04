//! Hybrid-encryption message envelope
//!
//! Construction:
//! 1. fresh 24-byte Triple-DES key
//! 2. signature over `"{sender_id}:{timestamp}"`
//! 3. key wrapped with RSA-OAEP for the recipient
//! 4. message encrypted with Triple-DES-CBC under a fresh IV
//! 5. digest = SHA256(iv || ciphertext)
//! 6. PSS signature over the digest
//!
//! Opening runs four stages in a fixed order: key unwrap, integrity,
//! authenticity, decryption. Integrity comes before authenticity so that a
//! corrupted ciphertext is never blamed on the signer.
//!
//! The auth-info signature is carried and decoded but never verified: the
//! signed string itself is not part of the envelope.

use serde::{Deserialize, Serialize};

use super::encoding::{base64_bytes, hex_bytes};
use crate::crypto::{
    auth_info, compute_digest, decrypt_message, digests_match, encrypt_message, sign_auth_info,
    sign_digest, unwrap_key, verify_digest_signature, wrap_key, Identity, PublicKey, SymmetricKey,
};
use crate::error::{RejectionReason, Result};

/// Key-transport half of an envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBlock {
    /// PSS signature over the sender's auth-info string
    #[serde(rename = "signed_info", with = "base64_bytes")]
    signed_auth_info: Vec<u8>,
    /// Triple-DES key wrapped with RSA-OAEP
    #[serde(rename = "encrypted_3des_key", with = "base64_bytes")]
    wrapped_symmetric_key: Vec<u8>,
}

impl KeyBlock {
    pub fn signed_auth_info(&self) -> &[u8] {
        &self.signed_auth_info
    }

    pub fn wrapped_symmetric_key(&self) -> &[u8] {
        &self.wrapped_symmetric_key
    }
}

/// Encrypted message half of an envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBlock {
    #[serde(with = "base64_bytes")]
    iv: Vec<u8>,
    #[serde(rename = "cipher", with = "base64_bytes")]
    ciphertext: Vec<u8>,
    /// SHA256(iv || ciphertext)
    #[serde(rename = "hash", with = "hex_bytes")]
    digest: Vec<u8>,
    /// PSS signature whose signed quantity is SHA256(digest)
    #[serde(rename = "sig", with = "base64_bytes")]
    signature: Vec<u8>,
}

impl MessageBlock {
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// The unit a relay transports. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    sender_id: String,
    recipient_id: String,
    #[serde(rename = "message_payload")]
    message_block: MessageBlock,
    #[serde(rename = "encrypted_3des_key_payload")]
    key_block: KeyBlock,
}

impl Envelope {
    /// Encrypt and sign `plaintext` from `sender` to `recipient_id`.
    ///
    /// Any cryptographic failure aborts construction; a partially built
    /// envelope is never returned.
    pub fn build(
        sender: &Identity,
        recipient_id: impl Into<String>,
        recipient_key: &PublicKey,
        plaintext: &[u8],
    ) -> Result<Self> {
        let symmetric_key = SymmetricKey::generate();

        let signed_auth_info = sign_auth_info(&auth_info(sender.user_id()), sender)?;
        let wrapped_symmetric_key = wrap_key(&symmetric_key, recipient_key)?;

        let (iv, ciphertext) = encrypt_message(plaintext, &symmetric_key)?;
        let digest = compute_digest(&iv, &ciphertext);
        let signature = sign_digest(&digest, sender)?;

        Ok(Self {
            sender_id: sender.user_id().to_string(),
            recipient_id: recipient_id.into(),
            message_block: MessageBlock {
                iv: iv.to_vec(),
                ciphertext,
                digest: digest.to_vec(),
                signature,
            },
            key_block: KeyBlock {
                signed_auth_info,
                wrapped_symmetric_key,
            },
        })
    }

    /// Verify and decrypt with the recipient's identity and the sender's
    /// public key.
    pub fn open(
        &self,
        recipient: &Identity,
        sender_key: &PublicKey,
    ) -> std::result::Result<Vec<u8>, RejectionReason> {
        let symmetric_key = unwrap_key(&self.key_block.wrapped_symmetric_key, recipient)
            .map_err(|_| RejectionReason::KeyExchangeFailed)?;

        let msg = &self.message_block;
        let recomputed = compute_digest(&msg.iv, &msg.ciphertext);
        if !digests_match(&recomputed, &msg.digest) {
            return Err(RejectionReason::IntegrityCompromised);
        }

        verify_digest_signature(&recomputed, &msg.signature, sender_key)
            .map_err(|_| RejectionReason::AuthenticityFailed)?;

        decrypt_message(&msg.iv, &msg.ciphertext, &symmetric_key)
            .map_err(|_| RejectionReason::DecryptionFailed)
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn key_block(&self) -> &KeyBlock {
        &self.key_block
    }

    pub fn message_block(&self) -> &MessageBlock {
        &self.message_block
    }
}
