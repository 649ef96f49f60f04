//! Message encryption
//!
//! Three-key Triple-DES (EDE3) in CBC mode with PKCS#7 padding to the 8-byte
//! block size. Every message gets a fresh random IV.

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::TdesEde3;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

type TdesCbcEncryptor = cbc::Encryptor<TdesEde3>;
type TdesCbcDecryptor = cbc::Decryptor<TdesEde3>;

/// Size of the symmetric key in bytes
pub const KEY_SIZE: usize = 24;
/// Size of the IV (one cipher block) in bytes
pub const IV_SIZE: usize = 8;
/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// A 24-byte Triple-DES key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl SymmetricKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Build a key from raw bytes; anything but 24 bytes is refused
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Encrypt a message using Triple-DES in CBC mode
///
/// # Arguments
/// * `plaintext` - Message to encrypt, PKCS#7 padded to the 8-byte block
/// * `key` - 24-byte Triple-DES key
///
/// # Returns
/// `(iv, ciphertext)` where `iv` is freshly generated for this call
pub fn encrypt_message(plaintext: &[u8], key: &SymmetricKey) -> Result<([u8; IV_SIZE], Vec<u8>)> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let ciphertext = encrypt_with_iv(plaintext, key, &iv)?;
    Ok((iv, ciphertext))
}

/// Encrypt with a caller-chosen IV.
///
/// IV reuse under one key leaks plaintext equality.
pub(crate) fn encrypt_with_iv(plaintext: &[u8], key: &SymmetricKey, iv: &[u8]) -> Result<Vec<u8>> {
    let encryptor = TdesCbcEncryptor::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| Error::Encryption(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt a message produced by [`encrypt_message`]
///
/// # Arguments
/// * `iv` - 8-byte IV sent alongside the ciphertext
/// * `ciphertext` - Whole blocks of Triple-DES-CBC output
/// * `key` - 24-byte Triple-DES key
///
/// # Returns
/// The unpadded plaintext; any failure is [`Error::Decryption`]
pub fn decrypt_message(iv: &[u8], ciphertext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(Error::Decryption);
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption);
    }

    let decryptor = TdesCbcDecryptor::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| Error::Decryption)?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption)
}
