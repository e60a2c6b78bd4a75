use std::path::PathBuf;
use std::sync::Arc;

use postbox_core::ProfileName;
use postbox_keystore::{open_secret_store, SecretBackend, SecretStore};

use crate::modules::auth::{ClientFactory, CredentialManager};
use crate::modules::profiles::ProfileRegistry;
use crate::modules::system::config::{EnvCredentials, ProviderConfig};

/// Everything a command needs, built once per process.
pub struct CommandContext {
    pub config_dir: PathBuf,
    pub profile: Option<ProfileName>,
    pub provider: ProviderConfig,
    pub http: reqwest::Client,
    pub backend_name: &'static str,
    pub credentials: Arc<CredentialManager>,
    pub clients: ClientFactory,
}

impl CommandContext {
    pub(crate) fn open(
        config_dir: PathBuf,
        backend: SecretBackend,
        profile: Option<&str>,
    ) -> anyhow::Result<Self> {
        let store = open_secret_store(backend, &config_dir);
        let provider = ProviderConfig::from_env()?;
        Self::from_parts(
            config_dir,
            profile,
            provider,
            store,
            EnvCredentials::from_env(),
        )
    }

    pub(crate) fn from_parts(
        config_dir: PathBuf,
        profile: Option<&str>,
        provider: ProviderConfig,
        store: Arc<dyn SecretStore>,
        env: EnvCredentials,
    ) -> anyhow::Result<Self> {
        let profile = profile.map(ProfileName::parse).transpose()?;
        let http = reqwest::Client::builder().build()?;
        let backend_name = store.name();
        let registry = ProfileRegistry::new(&config_dir);
        let credentials = Arc::new(CredentialManager::new(store, registry, env));
        let clients = ClientFactory::new(
            Arc::clone(&credentials),
            http.clone(),
            provider.token_url.clone(),
        );
        Ok(Self {
            config_dir,
            profile,
            provider,
            http,
            backend_name,
            credentials,
            clients,
        })
    }

    /// Profile named on the command line, or the active one.
    pub(crate) fn target_profile(&self) -> Result<ProfileName, postbox_core::AuthError> {
        self.credentials.resolve_profile(self.profile.as_ref())
    }
}
