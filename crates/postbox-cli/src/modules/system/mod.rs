pub(crate) mod config;
pub(crate) mod types;

pub(crate) use config::{resolve_config_dir, EnvCredentials, ProviderConfig};
pub(crate) use types::CommandContext;
