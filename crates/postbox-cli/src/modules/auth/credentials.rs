use std::sync::{Arc, Mutex, PoisonError};

use postbox_core::{AuthError, ClientCredentials, ExportBundle, ProfileName, Tokens};
use postbox_keystore::{SecretKind, SecretStore, StoreKey};
use tracing::{debug, info, warn};

use crate::modules::profiles::ProfileRegistry;
use crate::modules::system::EnvCredentials;

/// Profile-scoped access to client credentials and tokens.
///
/// This is the only component that talks to the secret store. Reads first
/// move any single-profile secrets left by older releases into the
/// `default` profile.
pub struct CredentialManager {
    store: Arc<dyn SecretStore>,
    registry: ProfileRegistry,
    env: EnvCredentials,
    migrated: Mutex<bool>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn SecretStore>, registry: ProfileRegistry, env: EnvCredentials) -> Self {
        Self {
            store,
            registry,
            env,
            migrated: Mutex::new(false),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// `profile`, or the registry's active profile when none is given.
    pub fn resolve_profile(&self, profile: Option<&ProfileName>) -> Result<ProfileName, AuthError> {
        match profile {
            Some(profile) => Ok(profile.clone()),
            None => self.registry.active(),
        }
    }

    pub fn client_credentials(
        &self,
        profile: Option<&ProfileName>,
    ) -> Result<Option<ClientCredentials>, AuthError> {
        self.ensure_migrated()?;
        let profile = self.resolve_profile(profile)?;
        let id = self.store.get(&StoreKey::scoped(&profile, SecretKind::ClientId));
        let secret = self
            .store
            .get(&StoreKey::scoped(&profile, SecretKind::ClientSecret));
        if let (Some(id), Some(secret)) = (id, secret) {
            return Ok(Some(ClientCredentials::new(id, secret)));
        }
        if self.env_fallback_open(&profile)? {
            if let (Some(id), Some(secret)) = (&self.env.client_id, &self.env.client_secret) {
                debug!(profile = %profile, "using client credentials from environment");
                return Ok(Some(ClientCredentials::new(id.clone(), secret.clone())));
            }
        }
        Ok(None)
    }

    pub fn set_client_credentials(
        &self,
        credentials: &ClientCredentials,
        profile: Option<&ProfileName>,
    ) -> Result<(), AuthError> {
        self.ensure_migrated()?;
        let profile = self.resolve_profile(profile)?;
        self.write(&profile, SecretKind::ClientId, &credentials.client_id)?;
        self.write(&profile, SecretKind::ClientSecret, &credentials.client_secret)
    }

    pub fn tokens(&self, profile: Option<&ProfileName>) -> Result<Option<Tokens>, AuthError> {
        self.ensure_migrated()?;
        let profile = self.resolve_profile(profile)?;
        if let Some(raw) = self.store.get(&StoreKey::scoped(&profile, SecretKind::Tokens)) {
            match Tokens::from_json(&raw) {
                Some(tokens) => return Ok(Some(tokens)),
                None => warn!(profile = %profile, "stored tokens are malformed; ignoring them"),
            }
        }
        if self.env_fallback_open(&profile)? {
            if let Some(raw) = &self.env.tokens {
                match Tokens::from_json(raw) {
                    Some(tokens) => {
                        debug!(profile = %profile, "using tokens from environment");
                        return Ok(Some(tokens));
                    }
                    None => warn!("POSTBOX_TOKENS is not a valid token blob; ignoring it"),
                }
            }
        }
        Ok(None)
    }

    pub fn set_tokens(&self, tokens: &Tokens, profile: Option<&ProfileName>) -> Result<(), AuthError> {
        self.ensure_migrated()?;
        let profile = self.resolve_profile(profile)?;
        self.write(&profile, SecretKind::Tokens, &tokens.to_json()?)
    }

    /// Stores a freshly issued token set, keeping the refresh token and
    /// expiry of the current one where the provider left them out.
    pub fn rotate_tokens(&self, fresh: Tokens, profile: &ProfileName) -> Result<Tokens, AuthError> {
        let merged = match self.tokens(Some(profile))? {
            Some(previous) => fresh.merged_over(&previous),
            None => fresh,
        };
        self.set_tokens(&merged, Some(profile))?;
        debug!(profile = %profile, "stored rotated tokens");
        Ok(merged)
    }

    pub fn is_authenticated(&self, profile: Option<&ProfileName>) -> Result<bool, AuthError> {
        let profile = self.resolve_profile(profile)?;
        Ok(self.client_credentials(Some(&profile))?.is_some()
            && self.tokens(Some(&profile))?.is_some())
    }

    /// Forgets the tokens of a profile; its client credentials stay.
    pub fn logout(&self, profile: Option<&ProfileName>) -> Result<ProfileName, AuthError> {
        self.ensure_migrated()?;
        let profile = self.resolve_profile(profile)?;
        let mut deleted = self.store.delete(&StoreKey::scoped(&profile, SecretKind::Tokens));
        if profile.is_default() {
            deleted &= self.store.delete(&StoreKey::legacy(SecretKind::Tokens));
        }
        if !deleted {
            return Err(AuthError::SecretWriteFailed {
                profile: profile.to_string(),
                key: SecretKind::Tokens.to_string(),
            });
        }
        info!(profile = %profile, "logged out");
        Ok(profile)
    }

    /// Deletes every secret of `profile`. For `default` this includes
    /// legacy keys a failed migration left behind, so they cannot be
    /// migrated back later.
    pub fn delete_profile_credentials(&self, profile: &ProfileName) -> Result<(), AuthError> {
        self.ensure_migrated()?;
        let mut deleted = self.store.delete_profile(profile);
        if profile.is_default() {
            for kind in SecretKind::ALL {
                deleted &= self.store.delete(&StoreKey::legacy(kind));
            }
        }
        if deleted {
            Ok(())
        } else {
            Err(AuthError::SecretWriteFailed {
                profile: profile.to_string(),
                key: "credentials".to_string(),
            })
        }
    }

    pub fn export_profile(&self, profile: Option<&ProfileName>) -> Result<ExportBundle, AuthError> {
        let profile = self.resolve_profile(profile)?;
        let credentials = self
            .client_credentials(Some(&profile))?
            .ok_or_else(|| AuthError::MissingCredentials {
                profile: profile.to_string(),
            })?;
        let tokens = self
            .tokens(Some(&profile))?
            .ok_or_else(|| AuthError::MissingTokens {
                profile: profile.to_string(),
            })?;
        let email = self.registry.email(&profile)?;
        Ok(ExportBundle::new(&profile, email, credentials, tokens))
    }

    /// Writes a bundle's secrets under `target` (or the bundle's own
    /// profile name) and registers that profile. Existing secrets are
    /// overwritten. When a write fails for a profile that was not yet
    /// registered, whatever was written is removed again.
    pub fn import_profile(
        &self,
        bundle: &ExportBundle,
        target: Option<&ProfileName>,
    ) -> Result<ProfileName, AuthError> {
        bundle.ensure_supported()?;
        let profile = match target {
            Some(target) => target.clone(),
            None => ProfileName::parse(&bundle.profile)?,
        };
        self.ensure_migrated()?;
        let existed = self.registry.exists(&profile)?;
        let written = self
            .set_client_credentials(&bundle.client_credentials(), Some(&profile))
            .and_then(|()| self.set_tokens(&bundle.tokens, Some(&profile)))
            .and_then(|()| self.registry.add(&profile, bundle.email.as_deref()));
        if let Err(err) = written {
            if !existed && !self.store.delete_profile(&profile) {
                warn!(profile = %profile, "could not roll back a failed import");
            }
            return Err(err);
        }
        info!(profile = %profile, "imported profile");
        Ok(profile)
    }

    /// Removes an inactive profile together with its secrets.
    pub fn delete_profile(&self, profile: &ProfileName) -> Result<(), AuthError> {
        self.ensure_migrated()?;
        self.registry.check_removable(profile)?;
        self.delete_profile_credentials(profile)?;
        self.registry.remove(profile)?;
        info!(profile = %profile, "deleted profile");
        Ok(())
    }

    fn write(&self, profile: &ProfileName, kind: SecretKind, value: &str) -> Result<(), AuthError> {
        if self.store.set(&StoreKey::scoped(profile, kind), value) {
            debug!(profile = %profile, key = %kind, backend = self.store.name(), "stored secret");
            Ok(())
        } else {
            Err(AuthError::SecretWriteFailed {
                profile: profile.to_string(),
                key: kind.to_string(),
            })
        }
    }

    fn env_fallback_open(&self, profile: &ProfileName) -> Result<bool, AuthError> {
        Ok(profile.is_default() && self.registry.email(profile)?.is_none())
    }

    fn ensure_migrated(&self) -> Result<(), AuthError> {
        let mut migrated = self.migrated.lock().unwrap_or_else(PoisonError::into_inner);
        if !*migrated {
            *migrated = self.migrate_legacy()?;
        }
        Ok(())
    }

    /// Returns `true` when no legacy secret is left behind.
    fn migrate_legacy(&self) -> Result<bool, AuthError> {
        let default = ProfileName::default_profile();
        let mut found = false;
        let mut complete = true;
        for kind in SecretKind::ALL {
            let legacy = StoreKey::legacy(kind);
            let Some(value) = self.store.get(&legacy) else {
                continue;
            };
            found = true;
            let scoped = StoreKey::scoped(&default, kind);
            let copied = if self.store.get(&scoped).is_some() {
                debug!(key = %kind, "default profile already has this secret; keeping it");
                true
            } else {
                self.store.set(&scoped, &value)
            };
            if copied && self.store.delete(&legacy) {
                info!(key = %kind, "moved legacy secret into the default profile");
            } else {
                warn!(key = %kind, "legacy secret migration incomplete; will retry");
                complete = false;
            }
        }
        if found {
            self.registry.ensure_registered(&default)?;
        }
        Ok(complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_keystore::MemoryStore;

    fn name(value: &str) -> ProfileName {
        ProfileName::parse(value).expect("name")
    }

    fn manager(
        dir: &std::path::Path,
        env: EnvCredentials,
    ) -> (Arc<MemoryStore>, CredentialManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = CredentialManager::new(store.clone(), ProfileRegistry::new(dir), env);
        (store, manager)
    }

    fn env_with_everything() -> EnvCredentials {
        EnvCredentials {
            client_id: Some("env-id".to_string()),
            client_secret: Some("env-secret".to_string()),
            tokens: Some(r#"{"access_token":"env-access","refresh_token":"env-refresh"}"#.to_string()),
        }
    }

    #[test]
    fn tokens_roundtrip_per_profile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), EnvCredentials::default());
        let tokens = Tokens::new("a").with_refresh_token("r").with_expiry_date(42);
        manager.set_tokens(&tokens, Some(&name("work"))).expect("set");
        assert_eq!(manager.tokens(Some(&name("work"))).expect("get"), Some(tokens));
        assert_eq!(manager.tokens(Some(&name("personal"))).expect("get"), None);
    }

    #[test]
    fn partial_client_credentials_read_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        assert!(store.set(&StoreKey::scoped(&name("work"), SecretKind::ClientId), "cid"));
        assert_eq!(manager.client_credentials(Some(&name("work"))).expect("read"), None);
    }

    #[test]
    fn malformed_tokens_read_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        assert!(store.set(&StoreKey::scoped(&name("work"), SecretKind::Tokens), "{oops"));
        assert_eq!(manager.tokens(Some(&name("work"))).expect("read"), None);
        assert!(!manager.is_authenticated(Some(&name("work"))).expect("auth"));
    }

    #[test]
    fn failed_write_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        store.fail_writes_to(StoreKey::scoped(&name("work"), SecretKind::ClientSecret));
        let err = manager
            .set_client_credentials(&ClientCredentials::new("cid", "cs"), Some(&name("work")))
            .expect_err("write fails");
        assert!(matches!(err, AuthError::SecretWriteFailed { key, .. } if key == "client_secret"));
    }

    #[test]
    fn env_fallback_only_for_default_before_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), env_with_everything());

        let creds = manager.client_credentials(None).expect("read").expect("env creds");
        assert_eq!(creds.client_id, "env-id");
        assert!(manager.is_authenticated(None).expect("auth"));
        assert_eq!(manager.tokens(Some(&name("work"))).expect("read"), None);

        manager
            .registry()
            .add(&name("default"), Some("me@x.com"))
            .expect("login");
        assert_eq!(manager.client_credentials(None).expect("read"), None);
        assert_eq!(manager.tokens(None).expect("read"), None);
    }

    #[test]
    fn stored_values_win_over_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), env_with_everything());
        manager
            .set_client_credentials(&ClientCredentials::new("stored-id", "stored-secret"), None)
            .expect("set");
        let creds = manager.client_credentials(None).expect("read").expect("creds");
        assert_eq!(creds.client_id, "stored-id");
    }

    #[test]
    fn rotation_keeps_refresh_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), EnvCredentials::default());
        let work = name("work");
        manager
            .set_tokens(&Tokens::new("old").with_refresh_token("r1").with_expiry_date(1), Some(&work))
            .expect("set");

        let merged = manager
            .rotate_tokens(Tokens::new("new").with_expiry_date(2), &work)
            .expect("rotate");
        assert_eq!(merged.refresh_token.as_deref(), Some("r1"));
        let stored = manager.tokens(Some(&work)).expect("read").expect("tokens");
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("r1"));
        assert_eq!(stored.expiry_date, Some(2));
    }

    #[test]
    fn logout_drops_only_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), EnvCredentials::default());
        let work = name("work");
        manager
            .set_client_credentials(&ClientCredentials::new("cid", "cs"), Some(&work))
            .expect("creds");
        manager.set_tokens(&Tokens::new("a"), Some(&work)).expect("tokens");

        assert_eq!(manager.logout(Some(&work)).expect("logout"), work);
        assert_eq!(manager.tokens(Some(&work)).expect("read"), None);
        assert!(manager.client_credentials(Some(&work)).expect("read").is_some());
    }

    #[test]
    fn legacy_secrets_move_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        let legacy_tokens = Tokens::new("legacy-access").with_refresh_token("legacy-refresh");
        assert!(store.set(&StoreKey::legacy(SecretKind::ClientId), "legacy-id"));
        assert!(store.set(&StoreKey::legacy(SecretKind::ClientSecret), "legacy-secret"));
        assert!(store.set(
            &StoreKey::legacy(SecretKind::Tokens),
            &legacy_tokens.to_json().expect("json")
        ));

        let creds = manager.client_credentials(None).expect("read").expect("migrated");
        assert_eq!(creds, ClientCredentials::new("legacy-id", "legacy-secret"));
        assert_eq!(manager.tokens(None).expect("read"), Some(legacy_tokens));
        for kind in SecretKind::ALL {
            assert_eq!(store.get(&StoreKey::legacy(kind)), None);
        }
        assert_eq!(manager.registry().list().expect("list"), vec![name("default")]);
        assert_eq!(manager.registry().active().expect("active"), name("default"));
    }

    #[test]
    fn migration_never_clobbers_scoped_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        assert!(store.set(&StoreKey::legacy(SecretKind::ClientId), "legacy-id"));
        assert!(store.set(
            &StoreKey::scoped(&name("default"), SecretKind::ClientId),
            "newer-id"
        ));

        manager.tokens(None).expect("read");
        assert_eq!(
            store
                .get(&StoreKey::scoped(&name("default"), SecretKind::ClientId))
                .as_deref(),
            Some("newer-id")
        );
        assert_eq!(store.get(&StoreKey::legacy(SecretKind::ClientId)), None);
    }

    #[test]
    fn failed_migration_keeps_legacy_and_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_to(StoreKey::scoped(&name("default"), SecretKind::Tokens));
        let manager = CredentialManager::new(
            store.clone(),
            ProfileRegistry::new(dir.path()),
            EnvCredentials::default(),
        );
        assert!(store.set(&StoreKey::legacy(SecretKind::Tokens), r#"{"access_token":"a"}"#));

        assert_eq!(manager.tokens(None).expect("read"), None);
        assert!(store.get(&StoreKey::legacy(SecretKind::Tokens)).is_some());
        assert!(!*manager.migrated.lock().expect("lock"));
    }

    #[test]
    fn export_requires_credentials_and_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, manager) = manager(dir.path(), EnvCredentials::default());
        let work = name("work");
        assert!(matches!(
            manager.export_profile(Some(&work)),
            Err(AuthError::MissingCredentials { .. })
        ));
        manager
            .set_client_credentials(&ClientCredentials::new("cid", "cs"), Some(&work))
            .expect("creds");
        assert!(matches!(
            manager.export_profile(Some(&work)),
            Err(AuthError::MissingTokens { .. })
        ));
    }

    #[test]
    fn export_import_roundtrip_with_rename() {
        let source_dir = tempfile::tempdir().expect("tempdir");
        let (_store, source) = manager(source_dir.path(), EnvCredentials::default());
        let work = name("work");
        let tokens = Tokens::new("a").with_refresh_token("r").with_expiry_date(99);
        source
            .set_client_credentials(&ClientCredentials::new("cid", "cs"), Some(&work))
            .expect("creds");
        source.set_tokens(&tokens, Some(&work)).expect("tokens");
        source.registry().add(&work, Some("a@x.com")).expect("register");
        let bundle = source.export_profile(None).expect("export");
        assert_eq!(bundle.profile, "work");
        assert_eq!(bundle.email.as_deref(), Some("a@x.com"));

        let target_dir = tempfile::tempdir().expect("tempdir");
        let (_store, target) = manager(target_dir.path(), EnvCredentials::default());
        let imported = target
            .import_profile(&bundle, Some(&name("office")))
            .expect("import");
        assert_eq!(imported, name("office"));
        assert_eq!(target.registry().active().expect("active"), name("office"));
        let again = target.export_profile(Some(&imported)).expect("export");
        assert_eq!(again.client_id, "cid");
        assert_eq!(again.client_secret, "cs");
        assert_eq!(again.tokens, tokens);
        assert_eq!(again.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn import_rejects_future_bundles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        let mut bundle = ExportBundle::new(
            &name("work"),
            None,
            ClientCredentials::new("cid", "cs"),
            Tokens::new("a"),
        );
        bundle.version = 2;
        assert!(matches!(
            manager.import_profile(&bundle, None),
            Err(AuthError::UnsupportedBundleVersion(2))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_profile_checks_registry_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        let work = name("work");
        let personal = name("personal");
        for profile in [&work, &personal] {
            manager
                .set_client_credentials(&ClientCredentials::new("cid", "cs"), Some(profile))
                .expect("creds");
            manager.registry().add(profile, None).expect("add");
        }

        assert!(matches!(
            manager.delete_profile(&personal),
            Err(AuthError::ActiveProfileProtected(_))
        ));
        assert!(manager.client_credentials(Some(&personal)).expect("read").is_some());

        manager.delete_profile(&work).expect("delete");
        assert!(!manager.registry().exists(&work).expect("exists"));
        assert_eq!(store.get(&StoreKey::scoped(&work, SecretKind::ClientId)), None);
        assert!(matches!(
            manager.delete_profile(&work),
            Err(AuthError::ProfileNotFound(_))
        ));
    }

    fn seed_legacy(store: &MemoryStore) {
        assert!(store.set(&StoreKey::legacy(SecretKind::ClientId), "legacy-id"));
        assert!(store.set(&StoreKey::legacy(SecretKind::ClientSecret), "legacy-secret"));
        assert!(store.set(
            &StoreKey::legacy(SecretKind::Tokens),
            r#"{"access_token":"legacy-access","refresh_token":"legacy-refresh"}"#
        ));
    }

    fn reopen(store: &Arc<MemoryStore>, dir: &std::path::Path) -> CredentialManager {
        CredentialManager::new(
            store.clone(),
            ProfileRegistry::new(dir),
            EnvCredentials::default(),
        )
    }

    #[test]
    fn logout_over_legacy_layout_sticks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        seed_legacy(&store);

        assert_eq!(manager.logout(None).expect("logout"), name("default"));

        let later = reopen(&store, dir.path());
        assert!(!later.is_authenticated(None).expect("auth"));
        assert_eq!(later.tokens(None).expect("read"), None);
        assert_eq!(
            later.client_credentials(None).expect("read"),
            Some(ClientCredentials::new("legacy-id", "legacy-secret"))
        );
        for kind in SecretKind::ALL {
            assert_eq!(store.get(&StoreKey::legacy(kind)), None);
        }
    }

    #[test]
    fn logout_clears_legacy_tokens_left_by_failed_migration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_to(StoreKey::scoped(&name("default"), SecretKind::Tokens));
        let manager = reopen(&store, dir.path());
        assert!(store.set(&StoreKey::legacy(SecretKind::Tokens), r#"{"access_token":"a"}"#));

        manager.logout(None).expect("logout");
        assert_eq!(store.get(&StoreKey::legacy(SecretKind::Tokens)), None);
        assert_eq!(reopen(&store, dir.path()).tokens(None).expect("read"), None);
    }

    #[test]
    fn deleting_default_over_legacy_layout_sticks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        manager.registry().add(&name("default"), None).expect("add default");
        manager.registry().add(&name("work"), None).expect("add work");
        seed_legacy(&store);

        manager.delete_profile(&name("default")).expect("delete");
        assert_eq!(manager.registry().list().expect("list"), vec![name("work")]);

        let later = reopen(&store, dir.path());
        assert_eq!(later.tokens(Some(&name("default"))).expect("read"), None);
        assert_eq!(later.registry().list().expect("list"), vec![name("work")]);
        assert!(store.is_empty());
    }

    fn work_bundle() -> ExportBundle {
        ExportBundle::new(
            &name("work"),
            Some("a@x.com".to_string()),
            ClientCredentials::new("cid", "cs"),
            Tokens::new("a").with_refresh_token("r"),
        )
    }

    #[test]
    fn failed_import_leaves_no_secrets_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        store.fail_writes_to(StoreKey::scoped(&name("work"), SecretKind::Tokens));

        assert!(matches!(
            manager.import_profile(&work_bundle(), None),
            Err(AuthError::SecretWriteFailed { key, .. }) if key == "tokens"
        ));
        assert!(!manager.registry().exists(&name("work")).expect("exists"));
        assert_eq!(
            store.get(&StoreKey::scoped(&name("work"), SecretKind::ClientId)),
            None
        );
        assert!(store.is_empty());
    }

    #[test]
    fn failed_import_over_existing_profile_keeps_it_registered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, manager) = manager(dir.path(), EnvCredentials::default());
        manager.import_profile(&work_bundle(), None).expect("first import");
        store.fail_writes_to(StoreKey::scoped(&name("work"), SecretKind::Tokens));

        assert!(manager.import_profile(&work_bundle(), None).is_err());
        assert!(manager.registry().exists(&name("work")).expect("exists"));
        assert!(manager.is_authenticated(Some(&name("work"))).expect("auth"));
    }
}
