use super::context::AppContext;
use super::{prompts, sync};
use crate::output::Output;
use chrono::Utc;
use color_eyre::Result;
use review_sync_remote::Credential;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long `login` waits for the queued reviews to go out
const LOGIN_SWEEP_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn run_login(token: Option<String>, output: &Output) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => prompts::prompt_password("Access token")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(color_eyre::eyre::eyre!("Access token cannot be empty"));
    }

    let mut ctx = AppContext::load()?;
    ctx.credentials.set_access_token(token.clone());
    ctx.credentials.set_signed_in_at(Utc::now());
    ctx.credentials
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;

    // Start signed out so the new token always counts as a fresh sign-in
    ctx.auth.sign_out();
    let synchronizer = ctx.synchronizer();
    let mut reports = synchronizer.reports();
    let cancel = CancellationToken::new();
    let handle = synchronizer.spawn(None, cancel.clone());

    ctx.auth.sign_in(Credential::new(token));
    output.success("Signed in");

    tokio::select! {
        changed = tokio::time::timeout(LOGIN_SWEEP_TIMEOUT, reports.changed()) => match changed {
            Ok(Ok(())) => {
                let report = reports.borrow_and_update().clone();
                if let Some(report) = report {
                    sync::print_report(&report, output);
                }
            }
            Ok(Err(_)) => tracing::debug!("Synchronizer stopped before reporting"),
            Err(_) => output.warn("Still sending queued reviews; run 'moviereview sync' to finish"),
        },
        _ = tokio::signal::ctrl_c() => {
            output.warn("Interrupted; queued reviews will be sent on the next sync");
        }
    }

    cancel.cancel();
    if let Err(e) = handle.await {
        tracing::warn!("Synchronizer task ended abnormally: {}", e);
    }
    Ok(())
}

pub async fn run_logout(output: &Output) -> Result<()> {
    let mut ctx = AppContext::load()?;
    if ctx.credentials.get_access_token().is_none() {
        output.info("Not signed in");
        return Ok(());
    }

    ctx.credentials.clear_session();
    ctx.credentials
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;
    ctx.auth.sign_out();
    output.success("Signed out. Queued reviews stay on this device until you sign in again.");
    Ok(())
}
