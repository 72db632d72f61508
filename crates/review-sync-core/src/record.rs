use chrono::{DateTime, Utc};
use review_sync_models::{
    decode_rating, encode_rating, FailureKind, MovieId, ReviewDraft, SyncStatus,
};
use serde::{Deserialize, Serialize};

/// Persisted row for one movie's review.
///
/// The rating column is the plain star count, never the enum's own
/// representation, so the enum can change without migrating stored data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRecord {
    pub movie_id: u64,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub what_liked: Option<String>,
    #[serde(default)]
    pub what_did_not_like: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub submit_requested: bool,
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ReviewDraft> for ReviewRecord {
    fn from(draft: &ReviewDraft) -> Self {
        Self {
            movie_id: draft.movie_id.get(),
            rating: encode_rating(draft.rating),
            what_liked: draft.what_liked.clone(),
            what_did_not_like: draft.what_did_not_like.clone(),
            sync_status: draft.sync_status,
            failure: draft.failure.clone(),
            submit_requested: draft.submit_requested,
            idempotency_key: draft.idempotency_key.clone(),
            review_id: draft.review_id.clone(),
            updated_at: draft.updated_at,
        }
    }
}

impl ReviewRecord {
    /// Rebuild the in-memory draft.
    ///
    /// `Pending` never survives a reload: the attempt that wrote it may have
    /// been torn down mid-flight, so it comes back as a retryable failure.
    pub fn into_draft(self) -> ReviewDraft {
        let mut draft = ReviewDraft::new(MovieId(self.movie_id));
        draft.rating = decode_rating(self.rating);
        draft.what_liked = self.what_liked;
        draft.what_did_not_like = self.what_did_not_like;
        draft.sync_status = self.sync_status;
        draft.failure = self.failure;
        draft.submit_requested = self.submit_requested;
        draft.review_id = self.review_id;
        draft.updated_at = self.updated_at;
        // Records written before keys existed keep the freshly generated one
        if !self.idempotency_key.is_empty() {
            draft.idempotency_key = self.idempotency_key;
        }

        if draft.sync_status == SyncStatus::Pending {
            draft.sync_status = SyncStatus::Failed;
            draft.failure = Some(FailureKind::Transient);
            draft.submit_requested = true;
        }
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_sync_models::{Rating, ReviewField};

    fn sample_draft() -> ReviewDraft {
        let mut draft = ReviewDraft::new(MovieId(603));
        draft.apply(ReviewField::Rating(Some(Rating::FourStars)));
        draft.apply(ReviewField::WhatLiked("great cast".to_string()));
        draft
    }

    #[test]
    fn test_rating_column_is_star_count() {
        let record = ReviewRecord::from(&sample_draft());
        assert_eq!(record.rating, Some(4));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rating"], serde_json::json!(4));
    }

    #[test]
    fn test_record_restores_draft() {
        let draft = sample_draft();
        let restored = ReviewRecord::from(&draft).into_draft();
        assert_eq!(restored, draft);
    }

    #[test]
    fn test_pending_reloads_as_retryable_failure() {
        let mut draft = sample_draft();
        draft.mark_pending();
        let restored = ReviewRecord::from(&draft).into_draft();
        assert_eq!(restored.sync_status, SyncStatus::Failed);
        assert_eq!(restored.failure, Some(FailureKind::Transient));
        assert!(restored.is_sweep_candidate(false));
        assert_eq!(restored.idempotency_key, draft.idempotency_key);
    }

    #[test]
    fn test_unknown_star_count_loads_as_no_rating() {
        let json = r#"{"movie_id": 5, "rating": 10, "what_liked": "x", "updated_at": "2024-01-01T00:00:00Z"}"#;
        let record: ReviewRecord = serde_json::from_str(json).unwrap();
        let draft = record.into_draft();
        assert_eq!(draft.rating, None);
        assert_eq!(draft.sync_status, SyncStatus::Draft);
        assert!(!draft.idempotency_key.is_empty());
    }
}
