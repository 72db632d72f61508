use super::context::AppContext;
use crate::output::Output;
use color_eyre::Result;
use review_sync_core::SweepReport;
use review_sync_remote::AuthSessionProvider;
use serde_json::json;

pub fn print_report(report: &SweepReport, output: &Output) {
    if !output.is_human() {
        output.json(&json!({ "success": report.errors.is_empty(), "report": report }));
        return;
    }

    if report.awaiting_sign_in > 0 {
        output.warn(format!(
            "{} review(s) were refused with your current sign-in: run 'moviereview login' to send them",
            report.awaiting_sign_in
        ));
    }
    if report.attempted == 0 {
        if report.awaiting_sign_in == 0 {
            output.info("No queued reviews to send");
        }
        return;
    }

    output.success(format!(
        "Sent {} of {} queued review(s) in {}ms",
        report.submitted, report.attempted, report.duration_ms
    ));
    if report.retryable > 0 {
        output.warn(format!(
            "{} review(s) could not be sent and stay queued; try again later",
            report.retryable
        ));
    }
    if report.unauthenticated > 0 {
        output.warn(format!(
            "{} review(s) need you to sign in again: run 'moviereview login'",
            report.unauthenticated
        ));
    }
    if report.rejected > 0 {
        output.warn(format!(
            "{} review(s) were rejected; see 'moviereview list'",
            report.rejected
        ));
    }
    if report.skipped_in_progress > 0 {
        output.info(format!("{} review(s) were already being sent", report.skipped_in_progress));
    }
    for error in &report.errors {
        output.error(error);
    }
}

pub async fn run_sync(output: &Output) -> Result<()> {
    tracing::debug!("Sync command started");
    let ctx = AppContext::load()?;

    if !ctx.auth.is_signed_in() {
        output.warn("Not signed in. Run 'moviereview login' first; queued reviews are sent right after.");
        return Ok(());
    }

    let report = ctx
        .synchronizer()
        .sweep()
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Sync operation failed: {}", e))?;
    print_report(&report, output);

    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(color_eyre::eyre::eyre!("{} review(s) could not be processed", report.errors.len()))
    }
}
