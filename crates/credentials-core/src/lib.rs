//! # credentials-core
//!
//! Password-protected local credential store:
//! - Argon2id key derivation with a per-store random salt
//! - AES-256-GCM authenticated encryption of the credential mapping
//! - Versioned single-file envelope, replaced atomically on save
//! - Distinct errors for a wrong password and a corrupted file

pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod storage;

pub use config::StoreConfig;
pub use credential::{CredentialMapping, CredentialsManager, GITHUB_TOKEN_NAME, OPENAI_API_KEY_NAME};
pub use crypto::{KdfCost, KdfParameters};
pub use error::{CredentialsError, Result};
pub use storage::{EncryptedEnvelope, StagedWrite};
