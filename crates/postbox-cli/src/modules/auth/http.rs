use chrono::Utc;
use postbox_core::{redact_secrets, AuthError, ClientCredentials, Tokens};
use tracing::debug;

use crate::modules::auth::types::{TokenErrorResponse, TokenResponse, UserInfoResponse};

pub(crate) async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<Tokens, AuthError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];
    post_token_form(client, token_url, &params).await
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
    refresh_token: &str,
) -> Result<Tokens, AuthError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];
    post_token_form(client, token_url, &params).await
}

async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<Tokens, AuthError> {
    let response = client
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|err| AuthError::TokenExchange(redact_secrets(&err.to_string())))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(error) => match error.error_description {
                Some(description) => format!("{}: {description}", error.error),
                None => error.error,
            },
            Err(_) => body,
        };
        return Err(AuthError::TokenExchange(redact_secrets(&format!(
            "{status} {detail}"
        ))));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|err| AuthError::TokenExchange(redact_secrets(&err.to_string())))?;
    debug!(
        has_refresh_token = token.refresh_token.is_some(),
        expires_in = ?token.expires_in,
        "token endpoint responded"
    );
    token.into_tokens(Utc::now().timestamp_millis())
}

pub(crate) async fn fetch_account_email(
    client: &reqwest::Client,
    userinfo_url: &str,
    access_token: &str,
) -> anyhow::Result<String> {
    let response = client
        .get(userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("userinfo request failed: {status} {}", redact_secrets(&body));
    }
    let info: UserInfoResponse = response.json().await?;
    info.email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| anyhow::anyhow!("userinfo response has no email"))
}
