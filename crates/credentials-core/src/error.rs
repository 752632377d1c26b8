//! Error types for credentials-core

use thiserror::Error;

/// Result type alias for credential store operations
pub type Result<T> = std::result::Result<T, CredentialsError>;

/// Credential store error types
///
/// `IncorrectPassword` and `Corrupted` are kept strictly apart: the first
/// means the file is intact and another password may work, the second means
/// no password will ever open it.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Credentials file is corrupted: {0}")]
    Corrupted(String),

    #[error("Credential not found: {0}")]
    NotFound(String),

    /// The old password handed to `update_password` does not derive the key
    /// the store is currently unlocked with.
    #[error("Current password does not match the unlocked store")]
    PasswordMismatch,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CredentialsError {
    /// Whether retrying with a different password could succeed
    pub fn is_incorrect_password(&self) -> bool {
        matches!(self, Self::IncorrectPassword)
    }

    /// Whether the store can only be recovered by recreating it
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }
}
