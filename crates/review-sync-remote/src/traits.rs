use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_sync_models::{MovieId, Rating, ReviewPayload};
use serde::{Deserialize, Serialize};
use crate::auth::Credential;
use crate::error::RemoteError;

/// Acknowledgement of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedReview {
    pub review_id: String,
}

/// The signed-in user's review of a movie as stored remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReview {
    pub review_id: String,
    pub movie_id: MovieId,
    pub rating: Option<Rating>,
    pub what_liked: Option<String>,
    pub what_did_not_like: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RemoteReviewClient: Send + Sync {
    fn service_name(&self) -> &str;

    /// Submit a completed review.
    ///
    /// Implementations must forward `payload.idempotency_key` so that a
    /// repeat after a `Transient` failure does not create a second record.
    async fn submit(
        &self,
        credential: &Credential,
        payload: &ReviewPayload,
    ) -> Result<SubmittedReview, RemoteError>;

    /// Fetch the user's existing review for a movie, if any
    async fn fetch_review(
        &self,
        credential: &Credential,
        movie_id: MovieId,
    ) -> Result<Option<RemoteReview>, RemoteError>;
}
