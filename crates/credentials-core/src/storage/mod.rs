//! Persistence of the encrypted credential store
//!
//! A store is one file: a versioned header carrying the KDF parameters,
//! salt and nonce, followed by the AEAD-sealed payload. Writes go through a
//! temporary file and an atomic rename.

mod file_format;

pub use file_format::{
    read, stage, write, EncryptedEnvelope, StagedWrite, FORMAT_VERSION, HEADER_LEN, MAGIC,
    MAX_CIPHERTEXT_LEN,
};
