use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use postbox_core::{redact_secrets, AuthError, ClientCredentials, ProfileName};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Url;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::modules::auth::callback::{CallbackListener, CallbackParams, CallbackReply};
use crate::modules::auth::http::{exchange_code, fetch_account_email};
use crate::modules::auth::types::LoginOutcome;
use crate::modules::auth::CredentialManager;
use crate::modules::system::ProviderConfig;

const STATE_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowState {
    Idle,
    Listening,
    CodeReceived,
    Exchanging,
    Committed,
    Failed,
}

/// A started login: the consent URL to show the user and the listener
/// waiting for the provider redirect.
pub(crate) struct PendingLogin {
    pub consent_url: String,
    listener: CallbackListener,
}

impl PendingLogin {
    pub(crate) fn callback_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }
}

/// One authorization-code login for one profile.
pub(crate) struct OAuthFlowController {
    credentials: Arc<CredentialManager>,
    http: reqwest::Client,
    provider: ProviderConfig,
    profile: ProfileName,
    state: FlowState,
    csrf: Option<String>,
    client: Option<ClientCredentials>,
    redirect_uri: Option<String>,
}

impl OAuthFlowController {
    pub(crate) fn new(
        credentials: Arc<CredentialManager>,
        http: reqwest::Client,
        provider: ProviderConfig,
        profile: ProfileName,
    ) -> Self {
        Self {
            credentials,
            http,
            provider,
            profile,
            state: FlowState::Idle,
            csrf: None,
            client: None,
            redirect_uri: None,
        }
    }

    pub(crate) fn state(&self) -> FlowState {
        self.state
    }

    /// Stores the client credentials, binds the callback listener and
    /// builds the consent URL.
    pub(crate) async fn start(
        &mut self,
        client: ClientCredentials,
    ) -> Result<PendingLogin, AuthError> {
        if self.state != FlowState::Idle {
            return Err(AuthError::FlowAlreadyStarted);
        }
        let result = self.begin(client).await;
        if result.is_err() {
            self.state = FlowState::Failed;
        }
        result
    }

    async fn begin(&mut self, client: ClientCredentials) -> Result<PendingLogin, AuthError> {
        self.credentials
            .set_client_credentials(&client, Some(&self.profile))?;
        let csrf = generate_state_token();
        let listener =
            CallbackListener::bind(self.provider.callback_port, &self.provider.callback_path)
                .await?;
        let redirect_uri = self.provider.redirect_uri(listener.local_addr().port());
        let consent_url = self.consent_url(&client, &redirect_uri, &csrf)?;

        self.csrf = Some(csrf);
        self.client = Some(client);
        self.redirect_uri = Some(redirect_uri);
        self.state = FlowState::Listening;
        info!(profile = %self.profile, "waiting for oauth callback");
        Ok(PendingLogin {
            consent_url,
            listener,
        })
    }

    fn consent_url(
        &self,
        client: &ClientCredentials,
        redirect_uri: &str,
        csrf: &str,
    ) -> Result<String, AuthError> {
        let scope = self.provider.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.provider.auth_url,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", csrf),
            ],
        )
        .map_err(|err| AuthError::InvalidEndpoint {
            url: self.provider.auth_url.clone(),
            reason: err.to_string(),
        })?;
        Ok(url.into())
    }

    /// Waits for the redirect, exchanges the code and commits the profile.
    /// The listener is closed before this returns, whatever the outcome.
    pub(crate) async fn finish(
        &mut self,
        pending: PendingLogin,
    ) -> Result<LoginOutcome, AuthError> {
        let mut listener = pending.listener;
        let Some(request) = listener.next_request().await else {
            self.state = FlowState::Failed;
            listener.close().await;
            return Err(AuthError::OAuthProviderError(
                "callback listener stopped before a redirect arrived".to_string(),
            ));
        };
        self.state = FlowState::CodeReceived;

        let result = self.handle_callback(request.params).await;
        let reply = match &result {
            Ok(outcome) => CallbackReply::success(outcome.profile.as_str()),
            Err(err) => CallbackReply::failure(&redact_secrets(&err.to_string())),
        };
        if request.responder.send(reply).is_err() {
            debug!("browser went away before the reply was sent");
        }
        listener.close().await;

        self.state = if result.is_ok() {
            FlowState::Committed
        } else {
            FlowState::Failed
        };
        result
    }

    async fn handle_callback(&mut self, params: CallbackParams) -> Result<LoginOutcome, AuthError> {
        let expected = self.csrf.take();

        if let Some(error) = params.error {
            let detail = match params.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(AuthError::OAuthProviderError(redact_secrets(&detail)));
        }
        if !state_matches(expected.as_deref(), params.state.as_deref()) {
            warn!(profile = %self.profile, "oauth state mismatch");
            return Err(AuthError::OAuthCsrfMismatch);
        }
        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingAuthorizationCode)?;

        self.state = FlowState::Exchanging;
        let client = self
            .client
            .clone()
            .ok_or_else(|| AuthError::MissingCredentials {
                profile: self.profile.to_string(),
            })?;
        let redirect_uri = self.redirect_uri.clone().unwrap_or_default();
        let fresh = exchange_code(
            &self.http,
            &self.provider.token_url,
            &client,
            &code,
            &redirect_uri,
        )
        .await?;
        let tokens = self.credentials.rotate_tokens(fresh, &self.profile)?;

        let email = match fetch_account_email(
            &self.http,
            &self.provider.userinfo_url,
            &tokens.access_token,
        )
        .await
        {
            Ok(email) => Some(email),
            Err(err) => {
                warn!(profile = %self.profile, error = %redact_secrets(&err.to_string()), "could not fetch account email");
                None
            }
        };
        self.credentials
            .registry()
            .add(&self.profile, email.as_deref())?;
        info!(profile = %self.profile, "login committed");
        Ok(LoginOutcome {
            profile: self.profile.clone(),
            email,
        })
    }
}

/// 256 random bits, base64url without padding.
pub(crate) fn generate_state_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn state_matches(expected: Option<&str>, received: Option<&str>) -> bool {
    match (expected, received) {
        (Some(expected), Some(received)) => expected.as_bytes().ct_eq(received.as_bytes()).into(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_tokens_are_unique_and_url_safe() {
        let first = generate_state_token();
        let second = generate_state_token();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn state_comparison_requires_exact_match() {
        assert!(state_matches(Some("abc"), Some("abc")));
        assert!(!state_matches(Some("abc"), Some("abd")));
        assert!(!state_matches(Some("abc"), Some("ab")));
        assert!(!state_matches(Some("abc"), None));
        assert!(!state_matches(None, Some("abc")));
    }
}
