use std::path::PathBuf;

use postbox_core::AuthError;
use reqwest::Url;

pub(crate) const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub(crate) const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub(crate) const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub(crate) const DEFAULT_CALLBACK_PORT: u16 = 3000;
pub(crate) const DEFAULT_CALLBACK_PATH: &str = "/oauth2callback";
pub(crate) const CALLBACK_HOST: &str = "127.0.0.1";

pub(crate) const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/userinfo.email",
];

const AUTH_URL_ENV: &str = "POSTBOX_AUTH_URL";
const TOKEN_URL_ENV: &str = "POSTBOX_TOKEN_URL";
const USERINFO_URL_ENV: &str = "POSTBOX_USERINFO_URL";
const CALLBACK_PORT_ENV: &str = "POSTBOX_CALLBACK_PORT";
const CALLBACK_PATH_ENV: &str = "POSTBOX_CALLBACK_PATH";
const CLIENT_ID_ENV: &str = "POSTBOX_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "POSTBOX_CLIENT_SECRET";
const TOKENS_ENV: &str = "POSTBOX_TOKENS";

/// Platform config directory unless one was given explicitly.
pub(crate) fn resolve_config_dir(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    directories::ProjectDirs::from("", "", "postbox")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("could not determine a config directory; pass --config-dir"))
}

/// Provider endpoints and the local redirect address.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub callback_port: u16,
    pub callback_path: String,
    pub scopes: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            scopes: SCOPES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ProviderConfig {
    pub(crate) fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AuthError> {
        let mut config = Self::default();
        if let Some(url) = non_empty(lookup(AUTH_URL_ENV)) {
            config.auth_url = url;
        }
        if let Some(url) = non_empty(lookup(TOKEN_URL_ENV)) {
            config.token_url = url;
        }
        if let Some(url) = non_empty(lookup(USERINFO_URL_ENV)) {
            config.userinfo_url = url;
        }
        if let Some(port) = non_empty(lookup(CALLBACK_PORT_ENV)) {
            config.callback_port = port.parse().map_err(|_| AuthError::InvalidEndpoint {
                url: port.clone(),
                reason: format!("{CALLBACK_PORT_ENV} must be a port number"),
            })?;
        }
        if let Some(path) = non_empty(lookup(CALLBACK_PATH_ENV)) {
            config.callback_path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
        }
        for url in [&config.auth_url, &config.token_url, &config.userinfo_url] {
            Url::parse(url).map_err(|err| AuthError::InvalidEndpoint {
                url: url.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(config)
    }

    pub(crate) fn redirect_uri(&self, port: u16) -> String {
        format!("http://{CALLBACK_HOST}:{port}{}", self.callback_path)
    }
}

/// Credentials supplied through the environment. Only the `default`
/// profile may use them, and only until it has completed a login.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tokens: Option<String>,
}

impl EnvCredentials {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            client_id: non_empty(lookup(CLIENT_ID_ENV)),
            client_secret: non_empty(lookup(CLIENT_SECRET_ENV)),
            tokens: non_empty(lookup(TOKENS_ENV)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
