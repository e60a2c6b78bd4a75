//! Secret persistence for per-profile OAuth credentials.
//!
//! Every backend implements [`SecretStore`] and is addressed with a
//! [`StoreKey`]. Backend failures never escape as errors: reads degrade to
//! `None` and writes to `false`, with a warning logged.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use postbox_core::ProfileName;

mod file;
mod os_keyring;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use crate::file::FileStore;
pub use crate::os_keyring::{KeyringStore, KEYRING_SERVICE};
#[cfg(any(test, feature = "testing"))]
pub use crate::memory::MemoryStore;

#[derive(thiserror::Error, Debug, Clone)]
pub enum KeystoreError {
    #[error("unknown secret backend '{0}' (expected 'keyring' or 'file')")]
    UnknownBackend(String),
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// The well-known secrets stored for each profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    ClientId,
    ClientSecret,
    Tokens,
}

impl SecretKind {
    pub const ALL: [SecretKind; 3] = [Self::ClientId, Self::ClientSecret, Self::Tokens];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientId => "client_id",
            Self::ClientSecret => "client_secret",
            Self::Tokens => "tokens",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one secret. A key without a profile names the unscoped slot
/// written by single-profile releases; only migration reads those.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    profile: Option<ProfileName>,
    kind: SecretKind,
}

impl StoreKey {
    #[must_use]
    pub fn scoped(profile: &ProfileName, kind: SecretKind) -> Self {
        Self {
            profile: Some(profile.clone()),
            kind,
        }
    }

    #[must_use]
    pub fn legacy(kind: SecretKind) -> Self {
        Self {
            profile: None,
            kind,
        }
    }

    #[must_use]
    pub fn profile(&self) -> Option<&ProfileName> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> SecretKind {
        self.kind
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.profile.is_none()
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.profile {
            Some(profile) => write!(f, "{profile}:{}", self.kind),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

pub trait SecretStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;
    fn get(&self, key: &StoreKey) -> Option<String>;
    /// Returns `true` once the value is durably stored.
    fn set(&self, key: &StoreKey, value: &str) -> bool;
    /// Deleting a missing key succeeds.
    fn delete(&self, key: &StoreKey) -> bool;

    fn delete_profile(&self, profile: &ProfileName) -> bool {
        SecretKind::ALL.iter().fold(true, |ok, kind| {
            self.delete(&StoreKey::scoped(profile, *kind)) && ok
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecretBackend {
    #[default]
    Keyring,
    File,
}

impl SecretBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyring => "keyring",
            Self::File => "file",
        }
    }
}

impl fmt::Display for SecretBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretBackend {
    type Err = KeystoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            other => Err(KeystoreError::UnknownBackend(other.to_string())),
        }
    }
}

/// Opens the store for `backend`. File secrets live under `config_dir`.
pub fn open_secret_store(backend: SecretBackend, config_dir: &Path) -> Arc<dyn SecretStore> {
    match backend {
        SecretBackend::Keyring => Arc::new(KeyringStore::new(KEYRING_SERVICE)),
        SecretBackend::File => Arc::new(FileStore::new(config_dir)),
    }
}
