//! Unlocked credential store

use std::path::Path;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use super::codec::{self, CredentialMapping};
use crate::crypto::{self, derive_key, generate_nonce, KdfCost, KdfParameters, MasterKey, TAG_LEN};
use crate::error::{CredentialsError, Result};
use crate::storage::{self, EncryptedEnvelope, StagedWrite};

/// An unlocked credential store
///
/// Holds the decrypted mapping together with the KDF parameters and the key
/// they produced. Nothing is written back automatically; call
/// [`CredentialsManager::save`] to persist changes.
pub struct CredentialsManager {
    credentials: CredentialMapping,
    kdf: KdfParameters,
    key: MasterKey,
}

impl CredentialsManager {
    /// Start an empty store protected by `password`, with the default KDF cost
    pub fn create(password: &str) -> Result<Self> {
        Self::create_with_cost(password, KdfCost::default())
    }

    /// Start an empty store protected by `password`, with an explicit KDF cost
    ///
    /// Fails only if `cost` is out of range.
    pub fn create_with_cost(password: &str, cost: KdfCost) -> Result<Self> {
        let kdf = KdfParameters::generate(cost);
        let key = derive_key(password, &kdf)?;

        info!("Created new credential store");
        Ok(Self {
            credentials: CredentialMapping::new(),
            kdf,
            key,
        })
    }

    /// Unlock the store at `path`
    ///
    /// Returns `IncorrectPassword` when authentication fails (the file is
    /// left alone and another password may work), and `Corrupted` when the
    /// file layout or the decrypted payload is malformed.
    pub fn load(path: &Path, password: &str) -> Result<Self> {
        let envelope = storage::read(path)?;
        let key = derive_key(password, &envelope.kdf)?;

        let header = envelope.header()?;
        let plaintext = crypto::open(&key, &envelope.nonce, &header, &envelope.ciphertext)
            .map_err(|e| {
                if e.is_incorrect_password() {
                    warn!("Authentication failed for {:?}", path);
                }
                e
            })?;

        let credentials = codec::decode(&plaintext).map_err(|e| {
            warn!("Decrypted payload of {:?} is malformed", path);
            e
        })?;

        debug!("Loaded {} credentials from {:?}", credentials.len(), path);
        Ok(Self {
            credentials,
            kdf: envelope.kdf,
            key,
        })
    }

    /// Look up a credential
    pub fn get(&self, name: &str) -> Result<&str> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CredentialsError::NotFound(name.to_string()))
    }

    /// Insert or overwrite a credential
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        debug!("Setting credential {}", name);
        if let Some(mut previous) = self.credentials.insert(name, value.into()) {
            previous.zeroize();
        }
    }

    /// Remove a credential, returning whether it was present
    pub fn delete(&mut self, name: &str) -> bool {
        match self.credentials.remove(name) {
            Some(mut value) => {
                value.zeroize();
                debug!("Deleted credential {}", name);
                true
            }
            None => false,
        }
    }

    /// Whether a credential with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.credentials.contains_key(name)
    }

    /// Credential names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.credentials.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// KDF parameters (including salt) the current key was derived with
    pub fn kdf_parameters(&self) -> &KdfParameters {
        &self.kdf
    }

    /// Encrypt the store under a fresh nonce and atomically replace `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        self.stage_save(path)?.commit()?;
        info!("Saved {} credentials to {:?}", self.credentials.len(), path);
        Ok(())
    }

    /// Encrypt the store into a temporary file beside `path` without
    /// replacing it yet
    ///
    /// [`StagedWrite::commit`] finishes the save; dropping the staged write
    /// abandons it and leaves `path` as it was.
    pub fn stage_save(&self, path: &Path) -> Result<StagedWrite> {
        let envelope = self.seal()?;
        storage::stage(path, &envelope)
    }

    /// Re-key the store under `new_password` with a freshly generated salt
    ///
    /// `old_password` must derive the key the store is unlocked with,
    /// otherwise `PasswordMismatch` is returned and nothing changes. The KDF
    /// cost is kept. The file on disk is only superseded by the next `save`.
    pub fn update_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        let current = derive_key(old_password, &self.kdf)?;
        if !current.matches(&self.key) {
            warn!("Password rotation rejected: current password does not match");
            return Err(CredentialsError::PasswordMismatch);
        }

        let kdf = KdfParameters::generate(self.kdf.cost);
        let key = derive_key(new_password, &kdf)?;

        self.kdf = kdf;
        self.key = key;

        info!("Credential store password updated");
        Ok(())
    }

    fn seal(&self) -> Result<EncryptedEnvelope> {
        let plaintext = codec::encode(&self.credentials)?;
        let nonce = generate_nonce();

        let header = EncryptedEnvelope::header_for(&self.kdf, &nonce, plaintext.len() + TAG_LEN)?;
        let ciphertext = crypto::seal(&self.key, &nonce, &header, &plaintext)?;

        Ok(EncryptedEnvelope {
            kdf: self.kdf.clone(),
            nonce,
            ciphertext,
        })
    }
}

impl Drop for CredentialsManager {
    fn drop(&mut self) {
        for value in self.credentials.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for CredentialsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsManager")
            .field("names", &self.credentials.keys().collect::<Vec<_>>())
            .field("kdf", &self.kdf.cost)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
