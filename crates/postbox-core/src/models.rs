use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AuthError;

/// Name of the profile that predates multi-profile support.
pub const DEFAULT_PROFILE: &str = "default";

/// Schema version written into every export bundle.
pub const EXPORT_BUNDLE_VERSION: u32 = 1;

/// A validated profile name (`^[A-Za-z0-9_-]+$`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileName(String);

impl ProfileName {
    pub fn parse(name: &str) -> Result<Self, AuthError> {
        if is_valid_profile_name(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(AuthError::InvalidProfileName(name.to_string()))
        }
    }

    #[must_use]
    pub fn default_profile() -> Self {
        Self(DEFAULT_PROFILE.to_string())
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_PROFILE
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[must_use]
pub fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProfileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileName {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_profile_name(&value) {
            Ok(Self(value))
        } else {
            Err(AuthError::InvalidProfileName(value))
        }
    }
}

impl From<ProfileName> for String {
    fn from(value: ProfileName) -> Self {
        value.0
    }
}

/// The OAuth application identity used for one profile.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Access/refresh token pair as persisted per profile.
///
/// The serialized shape is the provider's: `access_token`, `refresh_token`,
/// and `expiry_date` in epoch milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl Tokens {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry_date: None,
            scope: None,
            token_type: None,
            id_token: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_expiry_date(mut self, expiry_date: i64) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    /// Parses a stored token blob. Anything malformed reads as `None`.
    #[must_use]
    pub fn from_json(raw: &str) -> Option<Self> {
        let tokens: Self = serde_json::from_str(raw).ok()?;
        if tokens.access_token.is_empty() {
            return None;
        }
        Some(tokens)
    }

    pub fn to_json(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }

    /// True when the token has no known expiry left beyond `skew_seconds`.
    /// Tokens without an expiry are treated as still valid.
    #[must_use]
    pub fn expires_within(&self, skew_seconds: i64) -> bool {
        self.expires_within_at(skew_seconds, chrono::Utc::now().timestamp_millis())
    }

    #[must_use]
    pub fn expires_within_at(&self, skew_seconds: i64, now_millis: i64) -> bool {
        match self.expiry_date {
            Some(expiry) => now_millis.saturating_add(skew_seconds.saturating_mul(1000)) >= expiry,
            None => false,
        }
    }

    /// Combines a freshly issued token set with the one it replaces.
    ///
    /// Fields the provider omitted in the fresh set are carried over, so a
    /// refresh token is never lost to a rotation that did not re-issue it.
    #[must_use]
    pub fn merged_over(self, previous: &Tokens) -> Tokens {
        Tokens {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.refresh_token.clone()),
            expiry_date: self.expiry_date.or(previous.expiry_date),
            scope: self.scope.or_else(|| previous.scope.clone()),
            token_type: self.token_type.or_else(|| previous.token_type.clone()),
            id_token: self.id_token.or_else(|| previous.id_token.clone()),
        }
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

/// Portable snapshot of one profile's credential state.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: u32,
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub tokens: Tokens,
}

impl ExportBundle {
    #[must_use]
    pub fn new(
        profile: &ProfileName,
        email: Option<String>,
        credentials: ClientCredentials,
        tokens: Tokens,
    ) -> Self {
        Self {
            version: EXPORT_BUNDLE_VERSION,
            profile: profile.to_string(),
            email,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            tokens,
        }
    }

    pub fn ensure_supported(&self) -> Result<(), AuthError> {
        if self.version == EXPORT_BUNDLE_VERSION {
            Ok(())
        } else {
            Err(AuthError::UnsupportedBundleVersion(self.version))
        }
    }

    #[must_use]
    pub fn client_credentials(&self) -> ClientCredentials {
        ClientCredentials::new(self.client_id.clone(), self.client_secret.clone())
    }
}

impl fmt::Debug for ExportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportBundle")
            .field("version", &self.version)
            .field("profile", &self.profile)
            .field("email", &self.email)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tokens", &self.tokens)
            .finish()
    }
}
