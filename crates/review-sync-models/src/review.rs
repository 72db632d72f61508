use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::movie::MovieId;
use crate::rating::Rating;
use crate::status::{FailureKind, SyncStatus};

/// A user's review of one movie, as held on this device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDraft {
    pub movie_id: MovieId,
    #[serde(with = "crate::rating::stars", default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub what_liked: Option<String>,
    #[serde(default)]
    pub what_did_not_like: Option<String>,
    pub sync_status: SyncStatus,
    /// Set while `sync_status` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// The user asked for this review to be submitted and it has not been
    /// acknowledged or rejected yet
    #[serde(default)]
    pub submit_requested: bool,
    /// Sent with every submission attempt so the server can drop duplicates
    pub idempotency_key: String,
    /// Identifier assigned by the remote service once submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One editable field together with its new value
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewField {
    Rating(Option<Rating>),
    WhatLiked(String),
    WhatDidNotLike(String),
}

impl ReviewField {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewField::Rating(_) => "rating",
            ReviewField::WhatLiked(_) => "what_liked",
            ReviewField::WhatDidNotLike(_) => "what_did_not_like",
        }
    }
}

/// The content sent to the remote service for a single submission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewPayload {
    pub movie_id: MovieId,
    pub rating: Rating,
    pub what_liked: Option<String>,
    pub what_did_not_like: Option<String>,
    pub idempotency_key: String,
}

/// Empty or whitespace-only text counts as blank
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

fn non_blank(value: String) -> Option<String> {
    if is_blank(Some(value.as_str())) {
        None
    } else {
        Some(value)
    }
}

impl ReviewDraft {
    pub fn new(movie_id: MovieId) -> Self {
        Self {
            movie_id,
            rating: None,
            what_liked: None,
            what_did_not_like: None,
            sync_status: SyncStatus::Draft,
            failure: None,
            submit_requested: false,
            idempotency_key: Uuid::new_v4().to_string(),
            review_id: None,
            updated_at: Utc::now(),
        }
    }

    /// A rating plus at least one non-blank text field
    pub fn is_eligible(&self) -> bool {
        self.rating.is_some()
            && (!is_blank(self.what_liked.as_deref()) || !is_blank(self.what_did_not_like.as_deref()))
    }

    pub fn is_submitted(&self) -> bool {
        self.sync_status == SyncStatus::Submitted
    }

    fn is_queued(&self) -> bool {
        self.submit_requested && self.is_eligible() && !self.is_submitted()
    }

    /// Whether a sweep should try to submit this draft.
    ///
    /// A draft whose credential was refused is only resent by a sweep that
    /// runs because a new credential was acquired.
    pub fn is_sweep_candidate(&self, after_sign_in: bool) -> bool {
        self.is_queued()
            && match &self.failure {
                None => true,
                Some(FailureKind::Unauthorized) => after_sign_in,
                Some(failure) => failure.is_auto_retryable(),
            }
    }

    /// Queued, but held back until the user signs in again
    pub fn awaits_sign_in(&self) -> bool {
        self.is_queued() && self.failure == Some(FailureKind::Unauthorized)
    }

    /// Replace exactly one field. Blank text is stored as absence.
    ///
    /// A failed draft that gets edited goes back to `Draft`; the submit
    /// intent is kept so the next sweep picks up the corrected content.
    /// A refused credential is not fixed by editing, so that marker stays.
    pub fn apply(&mut self, field: ReviewField) {
        match field {
            ReviewField::Rating(rating) => self.rating = rating,
            ReviewField::WhatLiked(text) => self.what_liked = non_blank(text),
            ReviewField::WhatDidNotLike(text) => self.what_did_not_like = non_blank(text),
        }
        if self.sync_status == SyncStatus::Failed {
            self.sync_status = SyncStatus::Draft;
            if self.failure != Some(FailureKind::Unauthorized) {
                self.failure = None;
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn payload(&self) -> Option<ReviewPayload> {
        if !self.is_eligible() {
            return None;
        }
        Some(ReviewPayload {
            movie_id: self.movie_id,
            rating: self.rating?,
            what_liked: self.what_liked.clone(),
            what_did_not_like: self.what_did_not_like.clone(),
            idempotency_key: self.idempotency_key.clone(),
        })
    }

    pub fn mark_pending(&mut self) {
        self.sync_status = SyncStatus::Pending;
        self.failure = None;
        self.submit_requested = true;
        self.updated_at = Utc::now();
    }

    pub fn mark_submitted(&mut self, review_id: String) {
        self.sync_status = SyncStatus::Submitted;
        self.failure = None;
        self.submit_requested = false;
        self.review_id = Some(review_id);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, failure: FailureKind) {
        if !failure.keeps_submit_intent() {
            self.submit_requested = false;
        }
        self.sync_status = SyncStatus::Failed;
        self.failure = Some(failure);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible_draft() -> ReviewDraft {
        let mut draft = ReviewDraft::new(MovieId(1));
        draft.apply(ReviewField::Rating(Some(Rating::FourStars)));
        draft.apply(ReviewField::WhatLiked("great cast".to_string()));
        draft
    }

    #[test]
    fn test_new_draft_is_empty() {
        let draft = ReviewDraft::new(MovieId(7));
        assert_eq!(draft.sync_status, SyncStatus::Draft);
        assert!(draft.rating.is_none());
        assert!(!draft.is_eligible());
        assert!(!draft.idempotency_key.is_empty());
    }

    #[test]
    fn test_apply_replaces_only_one_field() {
        let mut draft = eligible_draft();
        draft.apply(ReviewField::WhatDidNotLike("too long".to_string()));
        assert_eq!(draft.rating, Some(Rating::FourStars));
        assert_eq!(draft.what_liked.as_deref(), Some("great cast"));
        assert_eq!(draft.what_did_not_like.as_deref(), Some("too long"));

        draft.apply(ReviewField::WhatLiked("the score".to_string()));
        assert_eq!(draft.rating, Some(Rating::FourStars));
        assert_eq!(draft.what_liked.as_deref(), Some("the score"));
        assert_eq!(draft.what_did_not_like.as_deref(), Some("too long"));

        draft.apply(ReviewField::Rating(Some(Rating::TwoStars)));
        assert_eq!(draft.what_liked.as_deref(), Some("the score"));
        assert_eq!(draft.what_did_not_like.as_deref(), Some("too long"));
    }

    #[test]
    fn test_blank_text_is_stored_as_absence() {
        let mut draft = eligible_draft();
        draft.apply(ReviewField::WhatLiked("   \n\t".to_string()));
        assert_eq!(draft.what_liked, None);
        assert!(!draft.is_eligible());
    }

    #[test]
    fn test_eligibility_rule() {
        let mut draft = ReviewDraft::new(MovieId(1));
        draft.apply(ReviewField::WhatLiked("plot".to_string()));
        assert!(!draft.is_eligible(), "rating is required");

        draft.apply(ReviewField::Rating(Some(Rating::OneStar)));
        assert!(draft.is_eligible());

        draft.apply(ReviewField::WhatLiked(String::new()));
        draft.apply(ReviewField::WhatDidNotLike("ending".to_string()));
        assert!(draft.is_eligible(), "either text field is enough");
    }

    #[test]
    fn test_editing_failed_draft_reopens_it() {
        let mut draft = eligible_draft();
        draft.mark_pending();
        draft.mark_failed(FailureKind::Transient);
        assert!(draft.is_sweep_candidate(false));

        draft.apply(ReviewField::WhatLiked("the soundtrack".to_string()));
        assert_eq!(draft.sync_status, SyncStatus::Draft);
        assert_eq!(draft.failure, None);
        assert!(draft.submit_requested);
    }

    #[test]
    fn test_rejected_draft_is_not_a_sweep_candidate() {
        let mut draft = eligible_draft();
        draft.mark_pending();
        draft.mark_failed(FailureKind::Rejected { reason: "profanity".to_string() });
        assert!(!draft.submit_requested);
        assert!(!draft.is_sweep_candidate(true));
    }

    #[test]
    fn test_refused_credential_waits_for_sign_in() {
        let mut draft = eligible_draft();
        draft.mark_pending();
        draft.mark_failed(FailureKind::Unauthorized);
        assert!(draft.submit_requested);
        assert!(draft.awaits_sign_in());
        assert!(!draft.is_sweep_candidate(false));
        assert!(draft.is_sweep_candidate(true));

        draft.apply(ReviewField::WhatLiked("the soundtrack".to_string()));
        assert_eq!(draft.sync_status, SyncStatus::Draft);
        assert!(draft.awaits_sign_in());
        assert!(!draft.is_sweep_candidate(false));
    }

    #[test]
    fn test_submitted_draft_is_not_a_sweep_candidate() {
        let mut draft = eligible_draft();
        draft.mark_pending();
        draft.mark_submitted("r-1".to_string());
        assert!(draft.is_submitted());
        assert_eq!(draft.review_id.as_deref(), Some("r-1"));
        assert!(!draft.is_sweep_candidate(true));
    }

    #[test]
    fn test_payload_requires_eligibility() {
        let mut draft = ReviewDraft::new(MovieId(3));
        assert!(draft.payload().is_none());

        draft.apply(ReviewField::Rating(Some(Rating::FiveStars)));
        draft.apply(ReviewField::WhatDidNotLike("nothing".to_string()));
        let payload = draft.payload().unwrap();
        assert_eq!(payload.rating, Rating::FiveStars);
        assert_eq!(payload.what_liked, None);
        assert_eq!(payload.idempotency_key, draft.idempotency_key);
    }
}
