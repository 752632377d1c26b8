//! AES-256-GCM authenticated encryption
//!
//! Sealed output is `ciphertext || tag`, with the 16-byte tag appended the
//! way `aes-gcm` produces it. Nonces are 12 bytes and must never repeat
//! under one key, so every seal takes a freshly generated nonce.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::MasterKey;
use crate::error::{CredentialsError, Result};

/// Nonce length in bytes (96 bits, standard for GCM)
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Cipher identifier, stored on disk next to the KDF identifier
pub const CIPHER_ID_AES_256_GCM: u8 = 1;

/// Generate a random nonce for a single seal
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt and authenticate `plaintext`, binding `aad` into the tag
pub fn seal(key: &MasterKey, nonce: &[u8; NONCE_LEN], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CredentialsError::Encryption(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CredentialsError::Encryption(e.to_string()))
}

/// Verify and decrypt `ciphertext || tag`
///
/// Any authentication failure (wrong key, or tampered nonce, aad,
/// ciphertext or tag) is reported as `IncorrectPassword`.
pub fn open(
    key: &MasterKey,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CredentialsError::Encryption(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map(Zeroizing::new)
        .map_err(|_| CredentialsError::IncorrectPassword)
}
