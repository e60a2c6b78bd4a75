use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use postbox_core::fs::{ensure_private_dir, write_atomic};
use postbox_core::ProfileName;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{SecretKind, SecretStore, StoreKey};

const CREDENTIALS_DIR: &str = "credentials";
const LEGACY_FILE: &str = "credentials.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tokens: Option<String>,
}

impl CredentialRecord {
    fn slot(&mut self, kind: SecretKind) -> &mut Option<String> {
        match kind {
            SecretKind::ClientId => &mut self.client_id,
            SecretKind::ClientSecret => &mut self.client_secret,
            SecretKind::Tokens => &mut self.tokens,
        }
    }

    fn is_empty(&self) -> bool {
        self.client_id.is_none() && self.client_secret.is_none() && self.tokens.is_none()
    }
}

/// Owner-only JSON files: `credentials/<profile>.json` per profile, and the
/// single-profile `credentials.json` for legacy keys.
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// File that holds `key`.
    #[must_use]
    pub fn record_path(&self, key: &StoreKey) -> PathBuf {
        match key.profile() {
            Some(profile) => self.profile_path(profile),
            None => self.root.join(LEGACY_FILE),
        }
    }

    fn profile_path(&self, profile: &ProfileName) -> PathBuf {
        self.root
            .join(CREDENTIALS_DIR)
            .join(format!("{profile}.json"))
    }

    fn read_record(path: &Path) -> io::Result<Option<CredentialRecord>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn write_record(path: &Path, record: &CredentialRecord) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            ensure_private_dir(parent)?;
        }
        let payload = serde_json::to_vec_pretty(record)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        write_atomic(path, &payload)
    }

    /// Moves an unreadable record to `<file>.corrupt` so its contents can
    /// still be recovered by hand.
    fn set_aside(path: &Path) -> io::Result<PathBuf> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kept = path.with_file_name(format!("{name}.corrupt"));
        fs::rename(path, &kept)?;
        Ok(kept)
    }

    /// Applies `change` to one slot of the record holding `key`.
    ///
    /// A record that does not parse is set aside and replaced by a fresh
    /// one, so the other slots it held are no longer visible to the store.
    /// Any other read error aborts the write.
    fn update(
        &self,
        key: &StoreKey,
        change: impl FnOnce(&mut Option<String>),
    ) -> io::Result<()> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let path = self.record_path(key);
        let mut record = match Self::read_record(&path) {
            Ok(record) => record.unwrap_or_default(),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                let kept = Self::set_aside(&path)?;
                warn!(
                    path = %path.display(),
                    kept = %kept.display(),
                    error = %err,
                    "set aside unreadable credentials file"
                );
                CredentialRecord::default()
            }
            Err(err) => return Err(err),
        };
        change(record.slot(key.kind()));
        if record.is_empty() {
            debug!(path = %path.display(), "credentials record empty, removing");
            return match fs::remove_file(&path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            };
        }
        Self::write_record(&path, &record)
    }
}

impl SecretStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &StoreKey) -> Option<String> {
        let path = self.record_path(key);
        match Self::read_record(&path) {
            Ok(record) => record.and_then(|mut record| record.slot(key.kind()).take()),
            Err(err) => {
                warn!(key = %key, path = %path.display(), error = %err, "credentials file read failed");
                None
            }
        }
    }

    fn set(&self, key: &StoreKey, value: &str) -> bool {
        match self.update(key, |slot| *slot = Some(value.to_string())) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "credentials file write failed");
                false
            }
        }
    }

    fn delete(&self, key: &StoreKey) -> bool {
        match self.update(key, |slot| *slot = None) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "credentials file delete failed");
                false
            }
        }
    }

    fn delete_profile(&self, profile: &ProfileName) -> bool {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let path = self.profile_path(profile);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => {
                warn!(profile = %profile, error = %err, "credentials file removal failed");
                false
            }
        }
    }
}
