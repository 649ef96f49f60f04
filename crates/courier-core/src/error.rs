//! Error types for Courier Core

use thiserror::Error;

/// Core error type for Courier cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key wrap failed: {0}")]
    KeyWrap(String),

    /// Deliberately carries no detail: padding and format failures must be
    /// indistinguishable to the caller.
    #[error("Key unwrap failed")]
    KeyUnwrap,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed")]
    Decryption,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for Courier Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the envelope-opening pipeline that refused a message.
///
/// Stages run in declaration order; the first failing stage is reported.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("key exchange failed")]
    KeyExchangeFailed,

    #[error("integrity compromised")]
    IntegrityCompromised,

    #[error("authenticity failed")]
    AuthenticityFailed,

    #[error("decryption failed")]
    DecryptionFailed,
}
