//! Cryptographic primitives for the credential store
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption
//! - Argon2id key derivation from passwords
//! - Secure memory handling with zeroize

mod cipher;
mod key_derivation;
mod secure_memory;

pub use cipher::{generate_nonce, open, seal, CIPHER_ID_AES_256_GCM, NONCE_LEN, TAG_LEN};
pub use key_derivation::{derive_key, generate_salt, KdfAlgorithm, KdfCost, KdfParameters, SALT_LEN};
pub use secure_memory::{MasterKey, KEY_LEN};
