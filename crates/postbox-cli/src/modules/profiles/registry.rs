use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use postbox_core::fs::write_atomic;
use postbox_core::{AuthError, ProfileName};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub(crate) const REGISTRY_FILE: &str = "profiles.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ProfileEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryRecord {
    active_profile: ProfileName,
    profiles: BTreeMap<ProfileName, ProfileEntry>,
}

impl Default for RegistryRecord {
    fn default() -> Self {
        Self {
            active_profile: ProfileName::default_profile(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Known profiles, the active pointer and cached account emails.
///
/// Holds no secrets. Every call reads the record from disk, so changes made
/// by an earlier command are always visible.
pub struct ProfileRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProfileRegistry {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(REGISTRY_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn active(&self) -> Result<ProfileName, AuthError> {
        Ok(self.read()?.active_profile)
    }

    pub fn set_active(&self, name: &ProfileName) -> Result<(), AuthError> {
        self.update(|record| {
            if !record.profiles.contains_key(name) {
                return Err(AuthError::ProfileNotFound(name.to_string()));
            }
            record.active_profile = name.clone();
            Ok(())
        })
    }

    /// Registered profile names, sorted.
    pub fn list(&self) -> Result<Vec<ProfileName>, AuthError> {
        Ok(self.read()?.profiles.into_keys().collect())
    }

    pub fn exists(&self, name: &ProfileName) -> Result<bool, AuthError> {
        Ok(self.read()?.profiles.contains_key(name))
    }

    /// Registers `name` (keeping a cached email unless a new one is given)
    /// and makes it active.
    pub fn add(&self, name: &ProfileName, email: Option<&str>) -> Result<(), AuthError> {
        self.update(|record| {
            let entry = record.profiles.entry(name.clone()).or_default();
            if let Some(email) = email {
                entry.email = Some(email.to_string());
            }
            record.active_profile = name.clone();
            Ok(())
        })
    }

    /// Registers `name` without touching the active pointer.
    pub fn ensure_registered(&self, name: &ProfileName) -> Result<(), AuthError> {
        if self.exists(name)? {
            return Ok(());
        }
        self.update(|record| {
            record.profiles.entry(name.clone()).or_default();
            Ok(())
        })
    }

    pub fn remove(&self, name: &ProfileName) -> Result<(), AuthError> {
        self.update(|record| {
            ensure_removable(record, name)?;
            record.profiles.remove(name);
            Ok(())
        })
    }

    /// Fails the way [`Self::remove`] would, without changing anything.
    pub fn check_removable(&self, name: &ProfileName) -> Result<(), AuthError> {
        ensure_removable(&self.read()?, name)
    }

    pub fn email(&self, name: &ProfileName) -> Result<Option<String>, AuthError> {
        Ok(self
            .read()?
            .profiles
            .get(name)
            .and_then(|entry| entry.email.clone()))
    }

    pub fn set_email(&self, name: &ProfileName, email: &str) -> Result<(), AuthError> {
        self.update(|record| {
            let entry = record
                .profiles
                .get_mut(name)
                .ok_or_else(|| AuthError::ProfileNotFound(name.to_string()))?;
            entry.email = Some(email.to_string());
            Ok(())
        })
    }

    fn read(&self) -> Result<RegistryRecord, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    fn update<T>(
        &self,
        change: impl FnOnce(&mut RegistryRecord) -> Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut record = self.load()?;
        let result = change(&mut record)?;
        self.save(&record)?;
        Ok(result)
    }

    fn load(&self) -> Result<RegistryRecord, AuthError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no profile registry yet");
                return Ok(RegistryRecord::default());
            }
            Err(err) => return Err(err.into()),
        };
        let record: RegistryRecord =
            serde_json::from_str(&contents).map_err(|err| self.corrupt(err.to_string()))?;
        if !record.profiles.is_empty() && !record.profiles.contains_key(&record.active_profile) {
            return Err(self.corrupt(format!(
                "active profile '{}' is not registered",
                record.active_profile
            )));
        }
        Ok(record)
    }

    fn save(&self, record: &RegistryRecord) -> Result<(), AuthError> {
        let payload = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path, &payload)?;
        Ok(())
    }

    fn corrupt(&self, reason: String) -> AuthError {
        AuthError::CorruptConfig {
            path: self.path.clone(),
            reason,
        }
    }
}

fn ensure_removable(record: &RegistryRecord, name: &ProfileName) -> Result<(), AuthError> {
    if !record.profiles.contains_key(name) {
        return Err(AuthError::ProfileNotFound(name.to_string()));
    }
    if record.active_profile == *name {
        return Err(AuthError::ActiveProfileProtected(name.to_string()));
    }
    Ok(())
}
