use std::sync::Arc;

use chrono::{DateTime, Utc};
use postbox_core::{ClientCredentials, ProfileName};
use tracing::{debug, warn};

use crate::cli_args::LoginArgs;
use crate::modules::auth::types::UserInfoResponse;
use crate::modules::auth::OAuthFlowController;
use crate::modules::system::CommandContext;
use crate::prompt_line;

pub(crate) async fn handle_login(args: LoginArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    let profile = ctx.target_profile()?;
    let client = login_client_credentials(args.client_id, args.client_secret, ctx, &profile)?;

    let mut flow = OAuthFlowController::new(
        Arc::clone(&ctx.credentials),
        ctx.http.clone(),
        ctx.provider.clone(),
        profile.clone(),
    );
    let pending = flow.start(client).await?;

    let opened = !args.no_browser
        && match open::that(&pending.consent_url) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not open a browser");
                false
            }
        };
    if opened {
        println!("Opening browser to authorize profile '{profile}'...");
    } else {
        println!(
            "Open this URL to authorize profile '{profile}':\n{}",
            pending.consent_url
        );
    }
    println!(
        "Waiting for callback on http://{}{} (Ctrl-C to cancel)",
        pending.callback_addr(),
        ctx.provider.callback_path
    );

    let outcome = flow.finish(pending).await;
    debug!(state = ?flow.state(), "login flow finished");
    let outcome = outcome?;
    match outcome.email {
        Some(email) => println!("Logged in as {email} (profile '{}')", outcome.profile),
        None => println!("Logged in (profile '{}')", outcome.profile),
    }
    Ok(())
}

/// Flags first, then whatever the profile already has, then a prompt.
fn login_client_credentials(
    client_id: Option<String>,
    client_secret: Option<String>,
    ctx: &CommandContext,
    profile: &ProfileName,
) -> anyhow::Result<ClientCredentials> {
    if let (Some(id), Some(secret)) = (&client_id, &client_secret) {
        return Ok(ClientCredentials::new(id.clone(), secret.clone()));
    }
    let stored = ctx.credentials.client_credentials(Some(profile))?;
    let client_id = match client_id.or_else(|| stored.as_ref().map(|c| c.client_id.clone())) {
        Some(id) => id,
        None => prompt_required("OAuth client ID: ")?,
    };
    let client_secret = match client_secret.or_else(|| stored.map(|c| c.client_secret)) {
        Some(secret) => secret,
        None => prompt_required("OAuth client secret: ")?,
    };
    Ok(ClientCredentials::new(client_id, client_secret))
}

fn prompt_required(prompt: &str) -> anyhow::Result<String> {
    let value = prompt_line(prompt)?;
    if value.is_empty() {
        anyhow::bail!("{} is required", prompt.trim_end_matches([':', ' ']));
    }
    Ok(value)
}

pub(crate) fn handle_logout(ctx: &CommandContext) -> anyhow::Result<()> {
    let profile = ctx.credentials.logout(ctx.profile.as_ref())?;
    println!("Logged out of profile '{profile}'");
    Ok(())
}

pub(crate) fn handle_status(ctx: &CommandContext) -> anyhow::Result<()> {
    let profile = ctx.target_profile()?;
    let registry = ctx.credentials.registry();
    let email = registry.email(&profile)?;
    let authenticated = ctx.credentials.is_authenticated(Some(&profile))?;
    let tokens = ctx.credentials.tokens(Some(&profile))?;

    println!("profile: {profile}");
    println!("email: {}", email.as_deref().unwrap_or("-"));
    println!("authenticated: {}", if authenticated { "yes" } else { "no" });
    if let Some(expiry) = tokens
        .and_then(|tokens| tokens.expiry_date)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    {
        println!("access token expires: {}", expiry.to_rfc3339());
    }
    println!("secret backend: {}", ctx.backend_name);
    println!("config dir: {}", ctx.config_dir.display());
    println!("profiles file: {}", registry.path().display());
    Ok(())
}

pub(crate) async fn handle_whoami(ctx: &CommandContext) -> anyhow::Result<()> {
    let client = ctx.clients.for_profile(ctx.profile.as_ref())?;
    let info: UserInfoResponse = client.get_json(&ctx.provider.userinfo_url).await?;
    let email = info
        .email
        .ok_or_else(|| anyhow::anyhow!("userinfo response has no email"))?;
    let registry = ctx.credentials.registry();
    if registry.exists(client.profile())?
        && registry.email(client.profile())?.as_deref() != Some(email.as_str())
    {
        registry.set_email(client.profile(), &email)?;
    }
    println!("{email} (profile '{}')", client.profile());
    Ok(())
}
