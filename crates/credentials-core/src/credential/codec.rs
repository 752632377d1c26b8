//! Plaintext form of the credential mapping
//!
//! The mapping is a JSON object of name to secret. `BTreeMap` keeps keys
//! sorted, so the same mapping always encodes to the same bytes.

use std::collections::BTreeMap;
use zeroize::Zeroizing;

use crate::error::{CredentialsError, Result};

/// Credential name to secret value
pub type CredentialMapping = BTreeMap<String, String>;

/// Encode the mapping into its canonical bytes
pub fn encode(mapping: &CredentialMapping) -> Result<Zeroizing<Vec<u8>>> {
    Ok(Zeroizing::new(serde_json::to_vec(mapping)?))
}

/// Decode bytes produced by [`encode`]
///
/// Anything that is not a JSON object of strings to strings is reported as
/// `Corrupted`. Only the error position is reported, never serde's message,
/// which can quote decrypted input.
pub fn decode(bytes: &[u8]) -> Result<CredentialMapping> {
    serde_json::from_slice(bytes).map_err(|e| {
        CredentialsError::Corrupted(format!(
            "malformed payload at line {} column {}",
            e.line(),
            e.column()
        ))
    })
}
