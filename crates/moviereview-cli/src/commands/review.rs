use super::context::AppContext;
use super::prompts;
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use review_sync_core::{DiscardError, RepositoryNotice, SeedError, SeedOutcome, SubmitError};
use review_sync_models::{FailureKind, MovieId, Rating, ReviewDraft, ReviewField, SyncStatus};
use serde_json::json;
use tokio::sync::broadcast;

pub struct EditArgs {
    pub rating: Option<u8>,
    pub clear_rating: bool,
    pub liked: Option<String>,
    pub disliked: Option<String>,
}

impl EditArgs {
    fn into_fields(self) -> Vec<ReviewField> {
        let mut fields = Vec::new();
        if self.clear_rating {
            fields.push(ReviewField::Rating(None));
        } else if let Some(stars) = self.rating {
            fields.push(ReviewField::Rating(Rating::from_stars(i64::from(stars))));
        }
        if let Some(liked) = self.liked {
            fields.push(ReviewField::WhatLiked(liked));
        }
        if let Some(disliked) = self.disliked {
            fields.push(ReviewField::WhatDidNotLike(disliked));
        }
        fields
    }
}

fn stars(rating: Option<Rating>) -> String {
    match rating {
        Some(rating) => "★".repeat(rating.stars() as usize),
        None => "-".to_string(),
    }
}

fn status_cell(draft: &ReviewDraft) -> Cell {
    let label = match (&draft.sync_status, &draft.failure) {
        (SyncStatus::Failed, Some(failure)) => format!("failed ({})", failure),
        (SyncStatus::Draft, _) if draft.submit_requested => "queued".to_string(),
        (status, _) => status.to_string(),
    };
    let color = match draft.sync_status {
        SyncStatus::Submitted => Color::Green,
        SyncStatus::Failed => Color::Red,
        SyncStatus::Pending => Color::Yellow,
        SyncStatus::Draft if draft.submit_requested => Color::Yellow,
        SyncStatus::Draft => Color::Reset,
    };
    Cell::new(label).fg(color)
}

fn draft_table(draft: &ReviewDraft) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(format!("Movie {}", draft.movie_id))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    table.add_row(vec![Cell::new("Rating"), Cell::new(stars(draft.rating))]);
    table.add_row(vec![
        Cell::new("Liked"),
        Cell::new(draft.what_liked.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![
        Cell::new("Did not like"),
        Cell::new(draft.what_did_not_like.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![Cell::new("Status"), status_cell(draft)]);
    if let Some(review_id) = &draft.review_id {
        table.add_row(vec![Cell::new("Review ID"), Cell::new(review_id)]);
    }
    table.add_row(vec![
        Cell::new("Updated"),
        Cell::new(draft.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn print_draft(draft: &ReviewDraft, output: &Output) {
    if output.is_human() {
        output.table(&draft_table(draft));
        if !draft.is_submitted() && !draft.is_eligible() {
            output.info("Add a rating and at least one comment before submitting.".dimmed().to_string());
        }
    } else {
        output.json(&json!({ "review": draft }));
    }
}

/// Surface anything the repository reported while processing edits
fn report_notices(notices: &mut broadcast::Receiver<RepositoryNotice>, output: &Output) {
    while let Ok(notice) = notices.try_recv() {
        match notice {
            RepositoryNotice::EditNotPersisted { field, error, .. } => {
                output.warn(format!("Change to {} was not saved to disk: {}", field, error));
            }
            RepositoryNotice::EditDropped { field, error, .. } => {
                output.error(format!("Change to {} was dropped, stored review unreadable: {}", field, error));
            }
            RepositoryNotice::EditIgnored { field, .. } => {
                output.warn(format!("Review already submitted; change to {} ignored", field));
            }
            RepositoryNotice::OutcomeNotPersisted { status, error, .. } => {
                output.warn(format!("Submission result ({}) was not saved to disk: {}", status, error));
            }
        }
    }
}

pub async fn run_edit(movie: MovieId, edits: EditArgs, output: &Output) -> Result<()> {
    let fields = edits.into_fields();
    if fields.is_empty() {
        output.warn("Nothing to change. Use --rating, --clear-rating, --liked or --disliked");
        return Ok(());
    }

    let ctx = AppContext::load()?;
    let mut notices = ctx.repository.notices();
    for field in fields {
        ctx.repository.edit_field(movie, field);
    }

    // Waits for the queued edits before reading back
    let draft = ctx.repository.current(movie).await?;
    report_notices(&mut notices, output);
    if let Some(draft) = draft {
        print_draft(&draft, output);
    }
    Ok(())
}

pub async fn run_submit(movie: MovieId, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let mut notices = ctx.repository.notices();
    let result = ctx.repository.submit(movie).await;
    report_notices(&mut notices, output);

    match result {
        Ok(submitted) => {
            if output.is_human() {
                output.success(format!("Review for movie {} submitted (id {})", movie, submitted.review_id));
            } else {
                output.json(&json!({
                    "success": true,
                    "movie_id": movie,
                    "review_id": submitted.review_id,
                }));
            }
            Ok(())
        }
        Err(SubmitError::Unauthenticated) => {
            output.warn(format!(
                "Not signed in. Review for movie {} is queued; run 'moviereview login' to send it.",
                movie
            ));
            Ok(())
        }
        Err(SubmitError::RetryableFailure(message)) => {
            output.warn(format!(
                "Could not reach the review service ({}). The review is saved; run 'moviereview sync' to retry.",
                message
            ));
            Ok(())
        }
        Err(SubmitError::AlreadyInProgress) => {
            output.info(format!("A submission for movie {} is already in progress", movie));
            Ok(())
        }
        Err(SubmitError::Rejected(reason)) => {
            Err(color_eyre::eyre::eyre!("Review rejected by the server: {}", reason))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn run_show(movie: MovieId, remote: bool, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;

    if remote {
        match ctx.repository.seed_from_remote(movie).await {
            Ok(SeedOutcome::Seeded) => output.success("Fetched your review from the server"),
            Ok(SeedOutcome::LocalKept) => output.info("Showing the review stored on this device"),
            Ok(SeedOutcome::NotFound) => output.info("You have no review for this movie on the server"),
            Err(SeedError::Unauthenticated) => output.warn("Not signed in; showing local data only"),
            Err(e) => return Err(e.into()),
        }
    }

    match ctx.repository.current(movie).await? {
        Some(draft) => print_draft(&draft, output),
        None if output.is_human() => output.info(format!("No review for movie {}", movie)),
        None => output.json(&json!({ "review": null })),
    }
    Ok(())
}

pub async fn run_list(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let drafts = ctx.repository.list().await?;

    if !output.is_human() {
        output.json(&json!({ "reviews": drafts }));
        return Ok(());
    }

    if drafts.is_empty() {
        output.info("No reviews stored on this device");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Movie").add_attribute(Attribute::Bold),
        Cell::new("Rating").add_attribute(Attribute::Bold),
        Cell::new("Liked").add_attribute(Attribute::Bold),
        Cell::new("Did not like").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
    ]);
    for draft in &drafts {
        table.add_row(vec![
            Cell::new(draft.movie_id),
            Cell::new(stars(draft.rating)),
            Cell::new(draft.what_liked.as_deref().unwrap_or("-")),
            Cell::new(draft.what_did_not_like.as_deref().unwrap_or("-")),
            status_cell(draft),
        ]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    output.table(&table);

    let rejected = drafts
        .iter()
        .filter(|d| matches!(d.failure, Some(FailureKind::Rejected { .. })))
        .count();
    if rejected > 0 {
        output.warn(format!("{} review(s) were rejected and need changes before resubmitting", rejected));
    }
    Ok(())
}

pub async fn run_discard(movie: MovieId, yes: bool, output: &Output) -> Result<()> {
    if !yes && !prompts::confirm(&format!("Discard your review draft for movie {}?", movie))? {
        output.info("Nothing discarded");
        return Ok(());
    }

    let ctx = AppContext::load()?;
    match ctx.repository.discard(movie).await {
        Ok(true) => output.success(format!("Discarded review draft for movie {}", movie)),
        Ok(false) => output.info(format!("No review draft for movie {}", movie)),
        Err(DiscardError::AlreadySubmitted) => {
            return Err(color_eyre::eyre::eyre!(
                "The review for movie {} was already submitted and cannot be discarded",
                movie
            ));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
