use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use review_sync_models::{decode_rating, encode_rating, MovieId, ReviewPayload};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::error::RemoteError;
use crate::traits::{RemoteReview, SubmittedReview};

#[derive(Debug, Serialize)]
struct SubmitReviewRequest<'a> {
    rating: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    what_liked: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    what_did_not_like: Option<&'a str>,
}

/// Servers disagree on whether ids are strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReviewIdValue {
    Text(String),
    Number(u64),
}

impl ReviewIdValue {
    fn into_string(self) -> String {
        match self {
            ReviewIdValue::Text(s) => s,
            ReviewIdValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitReviewResponse {
    id: ReviewIdValue,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    id: ReviewIdValue,
    rating: Option<i32>,
    #[serde(default)]
    what_liked: Option<String>,
    #[serde(default)]
    what_did_not_like: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "detail")]
    message: String,
}

pub fn reviews_url(base_url: &str, movie_id: MovieId) -> String {
    format!("{}/movies/{}/reviews", base_url.trim_end_matches('/'), movie_id)
}

pub fn my_review_url(base_url: &str, movie_id: MovieId) -> String {
    format!("{}/mine", reviews_url(base_url, movie_id))
}

/// Pull a human-readable reason out of an error response body
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Map a non-success status onto the retry taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Transient(format!("{} - {}", status, error_message(status, body)))
        }
        s if s.is_server_error() => {
            RemoteError::Transient(format!("{} - {}", status, error_message(status, body)))
        }
        _ => RemoteError::Rejected(error_message(status, body)),
    }
}

fn submit_body(payload: &ReviewPayload) -> SubmitReviewRequest<'_> {
    SubmitReviewRequest {
        rating: encode_rating(Some(payload.rating)),
        what_liked: payload.what_liked.as_deref(),
        what_did_not_like: payload.what_did_not_like.as_deref(),
    }
}

/// POST a review; the idempotency key rides along as a header
pub async fn submit_review(
    client: &Client,
    base_url: &str,
    access_token: &str,
    payload: &ReviewPayload,
) -> Result<SubmittedReview, RemoteError> {
    let url = reviews_url(base_url, payload.movie_id);

    let response = client
        .post(&url)
        .bearer_auth(access_token)
        .header("Idempotency-Key", &payload.idempotency_key)
        .header("Accept", "application/json")
        .json(&submit_body(payload))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let error = classify_status(status, &error_text);
        warn!(movie_id = %payload.movie_id, status = %status, error = %error, "Review submission failed");
        return Err(error);
    }

    let body: SubmitReviewResponse = response.json().await?;
    let review_id = body.id.into_string();
    debug!(movie_id = %payload.movie_id, review_id = %review_id, "Review accepted");
    Ok(SubmittedReview { review_id })
}

/// GET the signed-in user's review for a movie; 404 means there is none
pub async fn fetch_my_review(
    client: &Client,
    base_url: &str,
    access_token: &str,
    movie_id: MovieId,
) -> Result<Option<RemoteReview>, RemoteError> {
    let url = my_review_url(base_url, movie_id);

    let response = client
        .get(&url)
        .bearer_auth(access_token)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        debug!(movie_id = %movie_id, "No remote review");
        return Ok(None);
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &error_text));
    }

    let body: ReviewResponse = response.json().await?;
    Ok(Some(into_remote_review(movie_id, body)))
}

fn into_remote_review(movie_id: MovieId, body: ReviewResponse) -> RemoteReview {
    RemoteReview {
        review_id: body.id.into_string(),
        movie_id,
        rating: decode_rating(body.rating),
        what_liked: body.what_liked,
        what_did_not_like: body.what_did_not_like,
        created_at: body.created_at,
    }
}
