use keyring::Entry;
use tracing::warn;

use crate::{KeystoreError, SecretStore, StoreKey};

pub const KEYRING_SERVICE: &str = "postbox-cli";

/// OS secret store (Keychain, Credential Manager, Secret Service).
///
/// Scoped keys use the account `"<profile>:<key>"`; legacy keys use the
/// bare key name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    #[must_use]
    pub fn account(key: &StoreKey) -> String {
        key.to_string()
    }

    fn entry(&self, key: &StoreKey) -> Result<Entry, KeystoreError> {
        Entry::new(&self.service, &Self::account(key)).map_err(|err| KeystoreError::Internal {
            message: err.to_string(),
        })
    }

    fn try_get(&self, key: &StoreKey) -> Result<Option<String>, KeystoreError> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(KeystoreError::Internal {
                message: err.to_string(),
            }),
        }
    }

    fn try_set(&self, key: &StoreKey, value: &str) -> Result<(), KeystoreError> {
        let entry = self.entry(key)?;
        entry
            .set_password(value)
            .map_err(|err| KeystoreError::Internal {
                message: err.to_string(),
            })
    }

    fn try_delete(&self, key: &StoreKey) -> Result<(), KeystoreError> {
        let entry = self.entry(key)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(KeystoreError::Internal {
                message: err.to_string(),
            }),
        }
    }
}

impl SecretStore for KeyringStore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn get(&self, key: &StoreKey) -> Option<String> {
        self.try_get(key).unwrap_or_else(|err| {
            warn!(key = %key, error = %err, "keyring read failed");
            None
        })
    }

    fn set(&self, key: &StoreKey, value: &str) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "keyring write failed");
                false
            }
        }
    }

    fn delete(&self, key: &StoreKey) -> bool {
        match self.try_delete(key) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "keyring delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecretKind;
    use postbox_core::ProfileName;

    #[test]
    fn accounts_are_profile_scoped() {
        let work = ProfileName::parse("work").expect("name");
        assert_eq!(
            KeyringStore::account(&StoreKey::scoped(&work, SecretKind::ClientSecret)),
            "work:client_secret"
        );
        assert_eq!(
            KeyringStore::account(&StoreKey::legacy(SecretKind::Tokens)),
            "tokens"
        );
    }
}
