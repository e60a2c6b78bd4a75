mod actions;
pub(crate) mod args;
pub(crate) mod callback;
pub(crate) mod client;
pub(crate) mod credentials;
pub(crate) mod flow;
pub(crate) mod http;
pub(crate) mod types;

pub(crate) use actions::{handle_login, handle_logout, handle_status, handle_whoami};
pub(crate) use client::ClientFactory;
pub(crate) use credentials::CredentialManager;
pub(crate) use flow::OAuthFlowController;
