//! Identity key management
//!
//! An identity is a user id bound to a 2048-bit RSA key pair (e = 65537).
//! The private half never leaves the process except as an explicit PKCS#8
//! export for local storage. The public half travels as base64(SPKI PEM).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 2048;
/// RSA public exponent
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;

/// A registered user's long-term key pair
#[derive(Clone)]
pub struct Identity {
    user_id: String,
    private_key: RsaPrivateKey,
    public_key: PublicKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Generate a fresh identity
    pub fn generate(user_id: impl Into<String>) -> Result<Self> {
        let exponent = BigUint::from(RSA_PUBLIC_EXPONENT);
        let private_key = RsaPrivateKey::new_with_exp(&mut OsRng, RSA_KEY_BITS, &exponent)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        Ok(Self::from_private_key(user_id, private_key))
    }

    /// Wrap an existing private key
    pub fn from_private_key(user_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        let public_key = PublicKey(private_key.to_public_key());
        Self {
            user_id: user_id.into(),
            private_key,
            public_key,
        }
    }

    /// Load an identity from a PKCS#8 PEM private key
    pub fn from_pkcs8_pem(user_id: impl Into<String>, pem: &str) -> Result<Self> {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self::from_private_key(user_id, private_key))
    }

    /// Export the private key as PKCS#8 PEM (for local storage only)
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

/// Public half of an identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Encode as SubjectPublicKeyInfo PEM
    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Decode from SubjectPublicKeyInfo PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPublicKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }

    /// Wire form: base64 of the PEM text
    pub fn to_wire(&self) -> Result<String> {
        Ok(BASE64.encode(self.to_pem()?))
    }

    /// Parse the wire form produced by [`PublicKey::to_wire`]
    pub fn from_wire(encoded: &str) -> Result<Self> {
        let pem = BASE64
            .decode(encoded)
            .map_err(|e| Error::Encoding(format!("public key is not base64: {}", e)))?;
        let pem = String::from_utf8(pem)
            .map_err(|_| Error::Encoding("public key PEM is not UTF-8".to_string()))?;
        Self::from_pem(&pem)
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.0
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        Self(key)
    }
}
