//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use spotify_api::SpotifyClient;
use spotify_auth::{AuthSession, CallbackParams, CallbackServer};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sign in through the browser and the loopback callback.
pub async fn login(ctx: &Context, no_browser: bool) -> Result<()> {
    let session = ctx.session()?;
    if session.is_authenticated() {
        output::print_success("Already logged in", ctx.format);
        return Ok(());
    }

    let redirect = ctx.config.redirect_url()?;
    let server = CallbackServer::bind(&redirect, ctx.config.callback_timeout()).await?;
    let url = session.login()?;

    let opened = !no_browser && open::that(url.as_str()).is_ok();
    if ctx.format == OutputFormat::Text {
        if opened {
            println!("Opened your browser to sign in. Waiting for the redirect...");
        } else {
            println!("Open this URL in your browser to sign in:\n\n  {}\n", url);
            println!("Waiting for the redirect to {}...", redirect);
        }
    }

    let params = server.wait().await.context(
        "No redirect received. Run 'toune login' again, or finish with 'toune callback <url>'",
    )?;
    session
        .handle_callback_params(params)
        .await
        .context("Login failed")?;

    report_signed_in(session, ctx.format).await;
    Ok(())
}

/// Finish a login from a redirect URL pasted by the user.
pub async fn callback(ctx: &Context, redirect_url: &str) -> Result<()> {
    let session = ctx.session()?;
    let params = CallbackParams::parse(redirect_url)?;
    session
        .handle_callback_params(params)
        .await
        .context("Login failed")?;

    report_signed_in(session, ctx.format).await;
    Ok(())
}

async fn report_signed_in(session: Arc<AuthSession>, format: OutputFormat) {
    let client = SpotifyClient::new(session);
    match client.current_user().await {
        Ok(user) => {
            let name = user.display_name.unwrap_or(user.id);
            output::print_success(&format!("Logged in as {}", name), format);
        }
        Err(e) => {
            debug!(error = %e, "Profile lookup after login failed");
            output::print_success("Logged in", format);
        }
    }
}

/// Sign out and clear the stored session.
pub async fn logout(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    if let Err(e) = session.logout() {
        warn!(error = %e, "Failed to clear stored session");
        return Err(e).context("Logout failed");
    }
    output::print_success("Logged out", ctx.format);
    Ok(())
}

/// Show the session state.
pub async fn status(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let status = session.status();

    match ctx.format {
        OutputFormat::Text => {
            if status.authenticated {
                println!("Auth:     logged in ({})", status.state);
            } else {
                println!("Auth:     not logged in");
            }
            if let Some(expires_at) = status.expires_at {
                println!("Expires:  {}", expires_at.to_rfc3339());
            }
            println!(
                "Refresh:  {}",
                if status.has_refresh_token { "stored" } else { "none" }
            );
        }
        OutputFormat::Json => output::print_json(&status)?,
    }

    Ok(())
}

/// Show the signed-in user's profile.
pub async fn whoami(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let user = client.current_user().await?;

    match ctx.format {
        OutputFormat::Text => {
            output::print_heading(user.display_name.as_deref().unwrap_or(&user.id));
            output::print_row("ID", &user.id);
            if let Some(email) = &user.email {
                output::print_row("Email", email);
            }
            if let Some(country) = &user.country {
                output::print_row("Country", country);
            }
            if let Some(product) = &user.product {
                output::print_row("Plan", product);
            }
        }
        OutputFormat::Json => output::print_json(&user)?,
    }

    Ok(())
}
