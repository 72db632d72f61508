use async_trait::async_trait;
use reqwest::Client;
use review_sync_config::ApiConfig;
use review_sync_models::{MovieId, ReviewPayload};
use std::sync::Arc;
use tracing::debug;
use crate::auth::Credential;
use crate::error::RemoteError;
use crate::http::api;
use crate::traits::{RemoteReview, RemoteReviewClient, SubmittedReview};

pub fn create_http_client(config: &ApiConfig) -> Client {
    Client::builder()
        .user_agent(concat!("moviereview/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout())
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// JSON-over-HTTP review service client
#[derive(Clone)]
pub struct HttpReviewClient {
    client: Arc<Client>,
    base_url: String,
}

impl HttpReviewClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: Arc::new(create_http_client(config)),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteReviewClient for HttpReviewClient {
    fn service_name(&self) -> &str {
        "http"
    }

    async fn submit(
        &self,
        credential: &Credential,
        payload: &ReviewPayload,
    ) -> Result<SubmittedReview, RemoteError> {
        debug!(movie_id = %payload.movie_id, "Submitting review over HTTP");
        api::submit_review(&self.client, &self.base_url, credential.as_str(), payload).await
    }

    async fn fetch_review(
        &self,
        credential: &Credential,
        movie_id: MovieId,
    ) -> Result<Option<RemoteReview>, RemoteError> {
        api::fetch_my_review(&self.client, &self.base_url, credential.as_str(), movie_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpReviewClient::new(&ApiConfig {
            base_url: "https://reviews.test/api/".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(client.base_url(), "https://reviews.test/api");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = HttpReviewClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        });
        let mut draft = review_sync_models::ReviewDraft::new(MovieId(1));
        draft.apply(review_sync_models::ReviewField::Rating(Some(review_sync_models::Rating::ThreeStars)));
        draft.apply(review_sync_models::ReviewField::WhatLiked("ok".to_string()));
        let payload = draft.payload().unwrap();

        let result = client.submit(&Credential::new("t"), &payload).await;
        assert!(matches!(result, Err(RemoteError::Transient(_))));
    }
}
