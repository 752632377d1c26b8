//! Password-based key derivation using Argon2id

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::secure_memory::{MasterKey, KEY_LEN};
use crate::error::{CredentialsError, Result};

/// Salt length in bytes, fixed by format version 1
pub const SALT_LEN: usize = 16;

const MEMORY_COST_MAX_KIB: u32 = 4 * 1024 * 1024;
const MEMORY_COST_MIN_KIB: u32 = 8;
const TIME_COST_MAX: u32 = 16;
const PARALLELISM_MAX: u32 = 16;

/// Key derivation algorithm, identified on disk by a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfAlgorithm {
    /// Argon2id, version 0x13
    Argon2id,
}

impl KdfAlgorithm {
    /// On-disk identifier
    pub fn id(self) -> u8 {
        match self {
            Self::Argon2id => 1,
        }
    }

    /// Look up an algorithm by its on-disk identifier
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Argon2id),
            _ => None,
        }
    }
}

/// Work factor for Argon2id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KdfCost {
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfCost {
    /// Cheap parameters for tests. Never use for a real store.
    pub fn for_testing() -> Self {
        Self {
            memory_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Check the cost against the accepted range, naming the offending field
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if !(1..=PARALLELISM_MAX).contains(&self.parallelism) {
            return Err("parallelism");
        }
        if !(1..=TIME_COST_MAX).contains(&self.time_cost) {
            return Err("time_cost");
        }
        let memory_min = MEMORY_COST_MIN_KIB.max(8 * self.parallelism);
        if !(memory_min..=MEMORY_COST_MAX_KIB).contains(&self.memory_kib) {
            return Err("memory_kib");
        }
        Ok(())
    }
}

/// Everything needed to reproduce a derived key, apart from the password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParameters {
    pub algorithm: KdfAlgorithm,
    pub cost: KdfCost,
    pub salt: [u8; SALT_LEN],
}

impl KdfParameters {
    /// Fresh parameters with a newly generated salt
    pub fn generate(cost: KdfCost) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            cost,
            salt: generate_salt(),
        }
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a password
///
/// Deterministic in `password` and `params`; nothing else feeds into it.
/// Blocks the calling thread for the configured cost.
pub fn derive_key(password: &str, params: &KdfParameters) -> Result<MasterKey> {
    params
        .cost
        .validate()
        .map_err(|field| CredentialsError::KeyDerivation(format!("{} out of range", field)))?;

    let argon2_params = Params::new(
        params.cost.memory_kib,
        params.cost.time_cost,
        params.cost.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CredentialsError::KeyDerivation(e.to_string()))?;

    let argon2 = match params.algorithm {
        KdfAlgorithm::Argon2id => Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params),
    };

    debug!(
        memory_kib = params.cost.memory_kib,
        time_cost = params.cost.time_cost,
        parallelism = params.cost.parallelism,
        "Deriving key"
    );

    let mut key_bytes = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), &params.salt, &mut key_bytes[..])
        .map_err(|e| CredentialsError::KeyDerivation(e.to_string()))?;

    Ok(MasterKey::new(*key_bytes))
}
