use async_trait::async_trait;
use review_sync_models::{MovieId, Rating, ReviewDraft, ReviewField, ReviewPayload};
use review_sync_remote::{
    AuthSession, Credential, RemoteError, RemoteReview, RemoteReviewClient, SubmittedReview,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use crate::error::StorageError;
use crate::repository::ReviewRepository;
use crate::store::{InMemoryReviewStore, LocalReviewStore};

/// Remote client that replays queued outcomes and records every call.
/// With no outcome queued a submission succeeds.
#[derive(Default)]
pub struct ScriptedRemote {
    outcomes: Mutex<VecDeque<Result<SubmittedReview, RemoteError>>>,
    submissions: Mutex<Vec<(String, ReviewPayload)>>,
    remote_review: Mutex<Option<RemoteReview>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every submission waits for `gate.notify_one()` before answering
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_outcome(&self, outcome: Result<SubmittedReview, RemoteError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_remote_review(&self, review: Option<RemoteReview>) {
        *self.remote_review.lock().unwrap() = review;
    }

    pub fn submissions(&self) -> Vec<ReviewPayload> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteReviewClient for ScriptedRemote {
    fn service_name(&self) -> &str {
        "scripted"
    }

    async fn submit(
        &self,
        credential: &Credential,
        payload: &ReviewPayload,
    ) -> Result<SubmittedReview, RemoteError> {
        let count = {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push((credential.as_str().to_string(), payload.clone()));
            submissions.len()
        };
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SubmittedReview {
                review_id: format!("review-{}", count),
            })
        })
    }

    async fn fetch_review(
        &self,
        _credential: &Credential,
        movie_id: MovieId,
    ) -> Result<Option<RemoteReview>, RemoteError> {
        Ok(self
            .remote_review
            .lock()
            .unwrap()
            .clone()
            .filter(|review| review.movie_id == movie_id))
    }
}

/// In-memory store whose reads and writes can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryReviewStore,
    pub fail_loads: AtomicBool,
    pub fail_saves: AtomicBool,
    /// Takes the calling worker down with it
    pub panic_loads: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn broken() -> StorageError {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk unavailable"))
    }
}

#[async_trait]
impl LocalReviewStore for FlakyStore {
    async fn load(&self, movie_id: MovieId) -> Result<Option<ReviewDraft>, StorageError> {
        if self.panic_loads.load(Ordering::SeqCst) {
            panic!("store crashed while loading movie {}", movie_id);
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.load(movie_id).await
    }

    async fn load_all(&self) -> Result<Vec<ReviewDraft>, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.load_all().await
    }

    async fn save(&self, draft: &ReviewDraft) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.save(draft).await
    }

    async fn delete(&self, movie_id: MovieId) -> Result<(), StorageError> {
        self.inner.delete(movie_id).await
    }
}

pub struct Harness {
    pub store: Arc<InMemoryReviewStore>,
    pub remote: Arc<ScriptedRemote>,
    pub auth: Arc<AuthSession>,
    pub repository: Arc<ReviewRepository>,
}

impl Harness {
    pub fn new(signed_in: bool) -> Self {
        Self::with_remote(signed_in, ScriptedRemote::new())
    }

    pub fn with_remote(signed_in: bool, remote: ScriptedRemote) -> Self {
        let store = Arc::new(InMemoryReviewStore::new());
        let remote = Arc::new(remote);
        let auth = Arc::new(if signed_in {
            AuthSession::signed_in(Credential::new("token-1"))
        } else {
            AuthSession::signed_out()
        });
        let repository = Arc::new(ReviewRepository::new(
            store.clone(),
            remote.clone(),
            auth.clone(),
        ));
        Self {
            store,
            remote,
            auth,
            repository,
        }
    }

    /// Rating 4, "great cast", dislike left blank
    pub fn write_eligible(&self, movie_id: MovieId) {
        self.repository
            .edit_field(movie_id, ReviewField::Rating(Some(Rating::FourStars)));
        self.repository
            .edit_field(movie_id, ReviewField::WhatLiked("great cast".to_string()));
        self.repository
            .edit_field(movie_id, ReviewField::WhatDidNotLike(String::new()));
    }
}

/// Poll until `check` holds; real time so spawned workers get to run
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
