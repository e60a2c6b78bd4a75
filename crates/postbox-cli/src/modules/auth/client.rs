use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use postbox_core::{redact_secrets, AuthError, ClientCredentials, ProfileName, Tokens};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::modules::auth::http::refresh_access_token;
use crate::modules::auth::CredentialManager;
use crate::REFRESH_SKEW_SECONDS;

/// Called with every newly issued token set; returns what was persisted.
pub(crate) type RotationHook = Arc<dyn Fn(Tokens) -> Result<Tokens, AuthError> + Send + Sync>;

/// HTTP client that signs requests for one profile and keeps its access
/// token fresh.
pub struct AuthenticatedClient {
    profile: ProfileName,
    http: reqwest::Client,
    token_url: String,
    credentials: ClientCredentials,
    tokens: TokioMutex<Tokens>,
    on_rotate: RotationHook,
}

impl AuthenticatedClient {
    pub(crate) fn new(
        profile: ProfileName,
        http: reqwest::Client,
        token_url: String,
        credentials: ClientCredentials,
        tokens: Tokens,
        on_rotate: RotationHook,
    ) -> Self {
        Self {
            profile,
            http,
            token_url,
            credentials,
            tokens: TokioMutex::new(tokens),
            on_rotate,
        }
    }

    pub fn profile(&self) -> &ProfileName {
        &self.profile
    }

    /// Current access token, refreshed first when it is about to expire.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.expires_within(REFRESH_SKEW_SECONDS) {
            if tokens.refresh_token.is_some() {
                debug!(profile = %self.profile, "access token expiring; refreshing");
                self.refresh_locked(&mut tokens).await?;
            } else {
                debug!(profile = %self.profile, "access token expiring and no refresh token");
            }
        }
        Ok(tokens.access_token.clone())
    }

    /// Sends a signed request, refreshing and retrying once on `401`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, AuthError> {
        let access_token = self.access_token().await?;
        let response = self
            .send_once(method.clone(), url, body.clone(), &access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(
            profile = %self.profile,
            method = %method,
            url = %url,
            "request unauthorized; refreshing access token"
        );
        let retry_token = {
            let mut tokens = self.tokens.lock().await;
            if tokens.refresh_token.is_none() {
                return Ok(response);
            }
            if tokens.access_token == access_token {
                self.refresh_locked(&mut tokens).await?;
            }
            tokens.access_token.clone()
        };
        self.send_once(method, url, body, &retry_token).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http(redact_secrets(&format!("{status} {body}"))));
        }
        response
            .json()
            .await
            .map_err(|err| AuthError::Http(redact_secrets(&err.to_string())))
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        access_token: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let builder = self
            .http
            .request(method.clone(), url)
            .bearer_auth(access_token);
        let builder = match body {
            Some(body) => builder.json(&body),
            None => builder,
        };
        let response = builder
            .send()
            .await
            .map_err(|err| AuthError::Http(redact_secrets(&err.to_string())))?;
        debug!(method = %method, url = %url, status = %response.status(), "http response");
        Ok(response)
    }

    async fn refresh_locked(&self, tokens: &mut Tokens) -> Result<(), AuthError> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::NotAuthenticated {
                profile: self.profile.to_string(),
            })?;
        let fresh = refresh_access_token(
            &self.http,
            &self.token_url,
            &self.credentials,
            &refresh_token,
        )
        .await?;
        *tokens = match (self.on_rotate)(fresh.clone()) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(profile = %self.profile, error = %err, "could not persist refreshed tokens");
                fresh.merged_over(tokens)
            }
        };
        Ok(())
    }
}

/// Builds and caches one [`AuthenticatedClient`] per profile.
pub struct ClientFactory {
    credentials: Arc<CredentialManager>,
    http: reqwest::Client,
    token_url: String,
    cache: Mutex<HashMap<ProfileName, Arc<AuthenticatedClient>>>,
}

impl ClientFactory {
    pub fn new(credentials: Arc<CredentialManager>, http: reqwest::Client, token_url: String) -> Self {
        Self {
            credentials,
            http,
            token_url,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_profile(
        &self,
        profile: Option<&ProfileName>,
    ) -> Result<Arc<AuthenticatedClient>, AuthError> {
        let profile = self.credentials.resolve_profile(profile)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = cache.get(&profile) {
            return Ok(Arc::clone(client));
        }

        let not_authenticated = || AuthError::NotAuthenticated {
            profile: profile.to_string(),
        };
        let credentials = self
            .credentials
            .client_credentials(Some(&profile))?
            .ok_or_else(not_authenticated)?;
        let tokens = self
            .credentials
            .tokens(Some(&profile))?
            .ok_or_else(not_authenticated)?;

        let manager = Arc::clone(&self.credentials);
        let hook_profile = profile.clone();
        let on_rotate: RotationHook =
            Arc::new(move |fresh: Tokens| manager.rotate_tokens(fresh, &hook_profile));

        let client = Arc::new(AuthenticatedClient::new(
            profile.clone(),
            self.http.clone(),
            self.token_url.clone(),
            credentials,
            tokens,
            on_rotate,
        ));
        cache.insert(profile, Arc::clone(&client));
        Ok(client)
    }
}
