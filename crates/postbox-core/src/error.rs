use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("profile '{profile}' is not authenticated; run `postbox login --profile {profile}`")]
    NotAuthenticated { profile: String },
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("profile '{0}' is active; switch to another profile before deleting it")]
    ActiveProfileProtected(String),
    #[error("invalid profile name '{0}': use letters, digits, '_' or '-'")]
    InvalidProfileName(String),
    #[error(
        "profile registry at {} is corrupt ({reason}); remove it and log in again",
        path.display()
    )]
    CorruptConfig { path: PathBuf, reason: String },
    #[error("oauth state mismatch; the callback did not originate from this login")]
    OAuthCsrfMismatch,
    #[error("oauth provider returned an error: {0}")]
    OAuthProviderError(String),
    #[error("unsupported export bundle version {0}")]
    UnsupportedBundleVersion(u32),
    #[error("no client credentials stored for profile '{profile}'")]
    MissingCredentials { profile: String },
    #[error("no tokens stored for profile '{profile}'")]
    MissingTokens { profile: String },
    #[error("oauth callback did not include an authorization code")]
    MissingAuthorizationCode,
    #[error("token response did not include an access token")]
    MissingAccessToken,
    #[error("token request failed: {0}")]
    TokenExchange(String),
    #[error("request failed: {0}")]
    Http(String),
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("failed to bind oauth callback listener on {addr}: {reason}")]
    ListenerBind { addr: String, reason: String },
    #[error("this login flow has already been started")]
    FlowAlreadyStarted,
    #[error("failed to write {key} for profile '{profile}' to the secret store")]
    SecretWriteFailed { profile: String, key: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
