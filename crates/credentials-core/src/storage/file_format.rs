//! On-disk envelope for the credential store
//!
//! Layout (format version 1, integers little-endian):
//!
//! ```text
//! magic "LZCR" | version u8 | kdf_id u8 | cipher_id u8
//! | memory_kib u32 | time_cost u32 | parallelism u32
//! | salt [16] | nonce [12] | ciphertext_len u32
//! | sha256(all preceding bytes) [32]
//! | ciphertext || tag [ciphertext_len]
//! ```
//!
//! The header (everything before the ciphertext) is also the AEAD
//! associated data. Damage to the header is caught by the digest and
//! reported as `Corrupted` before any password is involved; damage to the
//! ciphertext can only be caught by the AEAD tag.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::crypto::{
    KdfAlgorithm, KdfCost, KdfParameters, CIPHER_ID_AES_256_GCM, NONCE_LEN, SALT_LEN, TAG_LEN,
};
use crate::error::{CredentialsError, Result};

/// File magic
pub const MAGIC: &[u8; 4] = b"LZCR";

/// Current (and only) format version
pub const FORMAT_VERSION: u8 = 1;

const DIGEST_LEN: usize = 32;

/// Header length up to and including `ciphertext_len`
const HEADER_BODY_LEN: usize = 4 + 1 + 1 + 1 + 4 + 4 + 4 + SALT_LEN + NONCE_LEN + 4;

/// Full header length, digest included
pub const HEADER_LEN: usize = HEADER_BODY_LEN + DIGEST_LEN;

/// Largest ciphertext accepted when reading (16 MiB)
pub const MAX_CIPHERTEXT_LEN: usize = 16 * 1024 * 1024;

/// Everything persisted for one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub kdf: KdfParameters,
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Serialized header for the given fields, digest included
    ///
    /// The header is fixed before sealing (the ciphertext length is the
    /// plaintext length plus the tag), so it can serve as associated data.
    pub fn header_for(kdf: &KdfParameters, nonce: &[u8; NONCE_LEN], ciphertext_len: usize) -> Result<Vec<u8>> {
        let ciphertext_len = u32::try_from(ciphertext_len)
            .ok()
            .filter(|len| *len as usize <= MAX_CIPHERTEXT_LEN)
            .ok_or_else(|| CredentialsError::Encryption("payload too large".to_string()))?;

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.push(FORMAT_VERSION);
        header.push(kdf.algorithm.id());
        header.push(CIPHER_ID_AES_256_GCM);
        header.extend_from_slice(&kdf.cost.memory_kib.to_le_bytes());
        header.extend_from_slice(&kdf.cost.time_cost.to_le_bytes());
        header.extend_from_slice(&kdf.cost.parallelism.to_le_bytes());
        header.extend_from_slice(&kdf.salt);
        header.extend_from_slice(nonce);
        header.extend_from_slice(&ciphertext_len.to_le_bytes());

        let digest = Sha256::digest(&header);
        header.extend_from_slice(&digest);

        Ok(header)
    }

    /// Serialized header of this envelope
    pub fn header(&self) -> Result<Vec<u8>> {
        Self::header_for(&self.kdf, &self.nonce, self.ciphertext.len())
    }

    /// Serialize to the on-disk byte layout
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = self.header()?;
        bytes.extend_from_slice(&self.ciphertext);
        Ok(bytes)
    }

    /// Parse and validate the on-disk byte layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        if reader.take(MAGIC.len(), "magic")? != MAGIC {
            return Err(corrupted("not a credentials file"));
        }

        let version = reader.u8("version")?;
        if version != FORMAT_VERSION {
            return Err(corrupted(&format!("unsupported format version {}", version)));
        }

        if bytes.len() < HEADER_LEN {
            return Err(corrupted("truncated header"));
        }
        let expected = Sha256::digest(&bytes[..HEADER_BODY_LEN]);
        if expected.as_slice() != &bytes[HEADER_BODY_LEN..HEADER_LEN] {
            return Err(corrupted("header checksum mismatch"));
        }

        let algorithm = KdfAlgorithm::from_id(reader.u8("kdf_id")?)
            .ok_or_else(|| corrupted("unknown key derivation algorithm"))?;

        if reader.u8("cipher_id")? != CIPHER_ID_AES_256_GCM {
            return Err(corrupted("unknown cipher"));
        }

        let cost = KdfCost {
            memory_kib: reader.u32("memory_kib")?,
            time_cost: reader.u32("time_cost")?,
            parallelism: reader.u32("parallelism")?,
        };
        cost.validate()
            .map_err(|field| corrupted(&format!("{} out of range", field)))?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(reader.take(SALT_LEN, "salt")?);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(reader.take(NONCE_LEN, "nonce")?);

        let ciphertext_len = reader.u32("ciphertext_len")? as usize;
        if !(TAG_LEN..=MAX_CIPHERTEXT_LEN).contains(&ciphertext_len) {
            return Err(corrupted("ciphertext_len out of range"));
        }

        reader.take(DIGEST_LEN, "header_digest")?;

        let ciphertext = reader.take(ciphertext_len, "ciphertext")?.to_vec();
        if !reader.at_end() {
            return Err(corrupted("trailing bytes"));
        }

        Ok(Self {
            kdf: KdfParameters {
                algorithm,
                cost,
                salt,
            },
            nonce,
            ciphertext,
        })
    }
}

/// A fully written, flushed temporary file waiting to replace its target
///
/// Dropping it without calling [`StagedWrite::commit`] removes the
/// temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of the temporary file holding the new contents
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the staged file over the target
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| e.error)?;

        #[cfg(unix)]
        {
            if let Some(dir) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::File::open(dir)?.sync_all()?;
            }
        }

        debug!("Committed credentials file {:?}", target);
        Ok(())
    }
}

/// Write the envelope into a temporary file beside `path`, flushed to disk
///
/// The temporary file is created with owner-only permissions on unix.
pub fn stage(path: &Path, envelope: &EncryptedEnvelope) -> Result<StagedWrite> {
    let bytes = envelope.to_bytes()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;

    debug!("Staged {} bytes for {:?}", bytes.len(), path);
    Ok(StagedWrite {
        temp,
        target: path.to_path_buf(),
    })
}

/// Replace the file at `path` with the envelope, atomically
pub fn write(path: &Path, envelope: &EncryptedEnvelope) -> Result<()> {
    stage(path, envelope)?.commit()
}

/// Read and validate the envelope stored at `path`
///
/// A missing or unreadable file is an `Io` error; a file that exists but
/// does not parse is `Corrupted`.
pub fn read(path: &Path) -> Result<EncryptedEnvelope> {
    let bytes = std::fs::read(path)?;
    EncryptedEnvelope::from_bytes(&bytes).map_err(|e| {
        warn!("Rejected credentials file {:?}: {}", path, e);
        e
    })
}

fn corrupted(reason: &str) -> CredentialsError {
    CredentialsError::Corrupted(reason.to_string())
}

/// Bounds-checked cursor over the raw file bytes
struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| corrupted(&format!("truncated at {}", field)))?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, field)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn at_end(&self) -> bool {
        self.position == self.bytes.len()
    }
}
