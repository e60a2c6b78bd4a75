use postbox_core::{AuthError, Tokens};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_tokens(self, now_millis: i64) -> Result<Tokens, AuthError> {
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;
        Ok(Tokens {
            access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            expiry_date: self
                .expires_in
                .map(|seconds| now_millis.saturating_add(seconds.saturating_mul(1000))),
            scope: self.scope,
            token_type: self.token_type,
            id_token: self.id_token,
        })
    }
}

#[derive(Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
pub struct UserInfoResponse {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub profile: postbox_core::ProfileName,
    pub email: Option<String>,
}
