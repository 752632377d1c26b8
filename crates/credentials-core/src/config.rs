//! Store configuration
//!
//! Where the credentials file lives and how expensive key derivation is.
//! Values can come from an optional JSON settings file and from the
//! environment; nothing here is global.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::crypto::KdfCost;
use crate::error::{CredentialsError, Result};

/// File name of the store in the user's home directory
pub const DEFAULT_FILE_NAME: &str = ".lazy-coder-credentials.json";

/// Environment variable overriding the store path
pub const PATH_ENV_VAR: &str = "LAZYCODR_CREDENTIALS_FILE";

/// Resolved store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Location of the encrypted credentials file
    pub path: PathBuf,
    /// KDF cost used when creating a store or rotating its password
    pub kdf: KdfCost,
}

/// Settings file contents; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    path: Option<PathBuf>,
    kdf: Option<KdfCost>,
}

impl StoreConfig {
    /// Configuration for a store at an explicit path, with the default KDF cost
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf: KdfCost::default(),
        }
    }

    /// Default configuration: `~/.lazy-coder-credentials.json`
    pub fn from_home() -> Result<Self> {
        Ok(Self::with_path(default_path()?))
    }

    /// Load configuration from a JSON settings file
    ///
    /// A missing file yields the defaults; missing fields take their
    /// defaults. An out-of-range KDF cost is rejected here rather than at
    /// first use.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            debug!("No config file at {:?}, using defaults", config_path);
            return Self::from_home();
        }

        let contents = std::fs::read_to_string(config_path)?;
        let file: ConfigFile = serde_json::from_str(&contents)?;

        let path = match file.path {
            Some(path) => path,
            None => default_path()?,
        };
        let kdf = file.kdf.unwrap_or_default();
        kdf.validate()
            .map_err(|field| CredentialsError::Config(format!("kdf.{} out of range", field)))?;

        debug!("Loaded config from {:?}", config_path);
        Ok(Self { path, kdf })
    }

    /// Apply `LAZYCODR_CREDENTIALS_FILE` if it is set and non-empty
    pub fn with_env_overrides(self) -> Self {
        self.with_path_override(std::env::var_os(PATH_ENV_VAR))
    }

    fn with_path_override(mut self, value: Option<OsString>) -> Self {
        if let Some(path) = value.filter(|v| !v.is_empty()) {
            debug!("Credentials path overridden by {}", PATH_ENV_VAR);
            self.path = PathBuf::from(path);
        }
        self
    }

    /// Whether a store file currently exists at the configured path
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// `~/.lazy-coder-credentials.json`
pub fn default_path() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_FILE_NAME))
        .ok_or_else(|| CredentialsError::Config("Could not determine home directory".to_string()))
}
