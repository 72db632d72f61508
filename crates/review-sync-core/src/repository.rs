//! Reconciliation between the local review store and the remote service.
//!
//! Each movie gets its own worker task that owns the in-memory draft and
//! processes edits and submissions strictly in arrival order. Callers only
//! enqueue, so typing never waits on disk or network, and a submission
//! always sees every edit queued before it. Different movies never share a
//! worker or a lock.
//!
//! A worker with nothing queued and nobody observing retires after
//! [`IDLE_WORKER_TIMEOUT`]; the next command for that movie starts a fresh
//! one that rehydrates from the store.

use review_sync_models::{FailureKind, MovieId, ReviewDraft, ReviewField, SyncStatus};
use review_sync_remote::{
    AuthSessionProvider, RemoteError, RemoteReview, RemoteReviewClient, SubmittedReview,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument, warn};
use crate::error::{DiscardError, ReadError, SeedError, StorageError, SubmitError};
use crate::store::LocalReviewStore;

const NOTICE_CAPACITY: usize = 64;

/// How long a movie's worker waits for a command before retiring
pub const IDLE_WORKER_TIMEOUT: Duration = Duration::from_secs(60);

type Slots = Mutex<HashMap<MovieId, MovieSlot>>;

/// Side-channel reports for problems that must not interrupt editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryNotice {
    /// The edit is visible in memory but could not be written to disk
    EditNotPersisted {
        movie_id: MovieId,
        field: &'static str,
        error: String,
    },
    /// The stored review could not be read, so the edit was dropped
    EditDropped {
        movie_id: MovieId,
        field: &'static str,
        error: String,
    },
    /// Submitted reviews are immutable; the edit was ignored
    EditIgnored {
        movie_id: MovieId,
        field: &'static str,
    },
    /// A submission finished but its outcome could not be written to disk
    OutcomeNotPersisted {
        movie_id: MovieId,
        status: SyncStatus,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// No local review existed; the remote one is now stored as submitted
    Seeded,
    /// A local review already exists and stays authoritative
    LocalKept,
    /// The remote service has no review from this user
    NotFound,
}

enum Command {
    Edit(ReviewField),
    Submit(oneshot::Sender<Result<SubmittedReview, SubmitError>>),
    Snapshot(oneshot::Sender<Result<Option<ReviewDraft>, StorageError>>),
    Discard(oneshot::Sender<Result<bool, DiscardError>>),
    Seed(RemoteReview, oneshot::Sender<Result<bool, StorageError>>),
}

struct MovieSlot {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Option<ReviewDraft>>,
    submitting: Arc<AtomicBool>,
}

pub struct ReviewRepository {
    store: Arc<dyn LocalReviewStore>,
    remote: Arc<dyn RemoteReviewClient>,
    auth: Arc<dyn AuthSessionProvider>,
    slots: Arc<Slots>,
    notices: broadcast::Sender<RepositoryNotice>,
}

impl ReviewRepository {
    /// Must be called from within a Tokio runtime; workers are spawned lazily.
    pub fn new(
        store: Arc<dyn LocalReviewStore>,
        remote: Arc<dyn RemoteReviewClient>,
        auth: Arc<dyn AuthSessionProvider>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            store,
            remote,
            auth,
            slots: Arc::new(Mutex::new(HashMap::new())),
            notices,
        }
    }

    pub fn notices(&self) -> broadcast::Receiver<RepositoryNotice> {
        self.notices.subscribe()
    }

    /// Run `f` against the movie's live worker, starting one if needed.
    ///
    /// Commands are sent while the slot map is locked, which is also what a
    /// retiring worker holds while it closes its queue, so a send never
    /// lands in a queue that is about to be abandoned.
    fn with_slot<T>(&self, movie_id: MovieId, f: impl FnOnce(&MovieSlot) -> T) -> T {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = match slots.entry(movie_id) {
            Entry::Occupied(mut entry) => {
                // A worker that panicked leaves a closed queue behind
                if entry.get().commands.is_closed() {
                    entry.insert(self.start_worker(movie_id));
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(self.start_worker(movie_id)),
        };
        f(slot)
    }

    fn start_worker(&self, movie_id: MovieId) -> MovieSlot {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(None);
        let submitting = Arc::new(AtomicBool::new(false));
        let worker = MovieWorker {
            movie_id,
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            auth: Arc::clone(&self.auth),
            state: state_tx,
            submitting: Arc::clone(&submitting),
            notices: self.notices.clone(),
            slots: Arc::downgrade(&self.slots),
            current: None,
            loaded: false,
        };
        debug!(movie_id = %movie_id, "Starting review worker");
        tokio::spawn(worker.run(receiver));

        MovieSlot {
            commands,
            state: state_rx,
            submitting,
        }
    }

    fn send(&self, movie_id: MovieId, command: Command) -> bool {
        self.with_slot(movie_id, |slot| slot.commands.send(command).is_ok())
    }

    /// Number of movies with a running worker
    pub fn active_workers(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Observe a movie's review. The receiver already holds the state
    /// rehydrated from the local store and sees every later update in order.
    ///
    /// The worker stays alive while any receiver is held.
    pub async fn observe(
        &self,
        movie_id: MovieId,
    ) -> Result<watch::Receiver<Option<ReviewDraft>>, ReadError> {
        let mut receiver = self.with_slot(movie_id, |slot| slot.state.clone());
        self.current(movie_id).await?;
        receiver.borrow_and_update();
        Ok(receiver)
    }

    /// Current review for a movie after all previously queued edits
    pub async fn current(&self, movie_id: MovieId) -> Result<Option<ReviewDraft>, ReadError> {
        let (reply, response) = oneshot::channel();
        if !self.send(movie_id, Command::Snapshot(reply)) {
            return Err(ReadError::Closed);
        }
        match response.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ReadError::Closed),
        }
    }

    /// Every review held locally, straight from the store
    pub async fn list(&self) -> Result<Vec<ReviewDraft>, StorageError> {
        self.store.load_all().await
    }

    /// Queue a single-field edit.
    ///
    /// Returns immediately. Storage problems are reported through
    /// [`ReviewRepository::notices`], never to the caller.
    pub fn edit_field(&self, movie_id: MovieId, field: ReviewField) {
        debug!(movie_id = %movie_id, field = field.name(), "Queueing review edit");
        if !self.send(movie_id, Command::Edit(field)) {
            error!(movie_id = %movie_id, "Review worker is gone, edit dropped");
        }
    }

    /// Submit the movie's review to the remote service.
    ///
    /// At most one submission per movie is in flight; a concurrent call gets
    /// `AlreadyInProgress` without touching the network.
    #[instrument(skip(self))]
    pub async fn submit(&self, movie_id: MovieId) -> Result<SubmittedReview, SubmitError> {
        let (reply, response) = oneshot::channel();
        self.with_slot(movie_id, |slot| {
            if slot.submitting.swap(true, Ordering::AcqRel) {
                debug!("Submission already in progress");
                return Err(SubmitError::AlreadyInProgress);
            }
            if slot.commands.send(Command::Submit(reply)).is_err() {
                slot.submitting.store(false, Ordering::Release);
                return Err(SubmitError::Closed);
            }
            Ok(())
        })?;
        response.await.unwrap_or(Err(SubmitError::Closed))
    }

    /// Throw away an unsubmitted review. Returns whether anything was stored.
    pub async fn discard(&self, movie_id: MovieId) -> Result<bool, DiscardError> {
        let (reply, response) = oneshot::channel();
        if !self.send(movie_id, Command::Discard(reply)) {
            return Err(DiscardError::Closed);
        }
        response.await.unwrap_or(Err(DiscardError::Closed))
    }

    /// Pull the user's review from the remote service when this device has
    /// none, e.g. because it was written on another device.
    pub async fn seed_from_remote(&self, movie_id: MovieId) -> Result<SeedOutcome, SeedError> {
        let credential = self.auth.credential().ok_or(SeedError::Unauthenticated)?;
        let Some(remote_review) = self.remote.fetch_review(&credential, movie_id).await? else {
            return Ok(SeedOutcome::NotFound);
        };

        let (reply, response) = oneshot::channel();
        if !self.send(movie_id, Command::Seed(remote_review, reply)) {
            return Err(SeedError::Closed);
        }
        match response.await {
            Ok(Ok(true)) => Ok(SeedOutcome::Seeded),
            Ok(Ok(false)) => Ok(SeedOutcome::LocalKept),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(SeedError::Closed),
        }
    }
}

/// Single writer for one movie's review
struct MovieWorker {
    movie_id: MovieId,
    store: Arc<dyn LocalReviewStore>,
    remote: Arc<dyn RemoteReviewClient>,
    auth: Arc<dyn AuthSessionProvider>,
    state: watch::Sender<Option<ReviewDraft>>,
    submitting: Arc<AtomicBool>,
    notices: broadcast::Sender<RepositoryNotice>,
    slots: Weak<Slots>,
    current: Option<ReviewDraft>,
    loaded: bool,
}

impl MovieWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let command = match tokio::time::timeout(IDLE_WORKER_TIMEOUT, commands.recv()).await {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(_) if self.retire(&mut commands) => break,
                Err(_) => continue,
            };
            match command {
                Command::Edit(field) => self.handle_edit(field).await,
                Command::Submit(reply) => {
                    let result = self.handle_submit().await;
                    self.submitting.store(false, Ordering::Release);
                    let _ = reply.send(result);
                }
                Command::Snapshot(reply) => {
                    let result = self.ensure_loaded().await.map(|_| self.current.clone());
                    let _ = reply.send(result);
                }
                Command::Discard(reply) => {
                    let _ = reply.send(self.handle_discard().await);
                }
                Command::Seed(remote_review, reply) => {
                    let _ = reply.send(self.handle_seed(remote_review).await);
                }
            }
        }
        debug!(movie_id = %self.movie_id, "Review worker stopped");
    }

    /// Leave the slot map if nothing is queued and nobody observes this
    /// movie. Returns whether the worker should stop.
    fn retire(&self, commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
        let Some(shared) = self.slots.upgrade() else {
            return true;
        };
        let mut slots = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // The slot keeps one receiver of its own
        if !commands.is_empty() || self.state.receiver_count() > 1 {
            return false;
        }
        commands.close();
        slots.remove(&self.movie_id);
        debug!(movie_id = %self.movie_id, "Retiring idle review worker");
        true
    }

    /// Rehydrate from the store on first use; retried on the next command
    /// if the read fails
    async fn ensure_loaded(&mut self) -> Result<(), StorageError> {
        if self.loaded {
            return Ok(());
        }
        let draft = self.store.load(self.movie_id).await?;
        self.loaded = true;
        self.current = draft.clone();
        self.state.send_replace(draft);
        Ok(())
    }

    fn publish(&mut self, draft: Option<ReviewDraft>) {
        self.current = draft.clone();
        self.state.send_replace(draft);
    }

    fn notify(&self, notice: RepositoryNotice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }

    async fn handle_edit(&mut self, field: ReviewField) {
        let field_name = field.name();
        if let Err(e) = self.ensure_loaded().await {
            warn!(movie_id = %self.movie_id, field = field_name, error = %e, "Could not load review, edit dropped");
            self.notify(RepositoryNotice::EditDropped {
                movie_id: self.movie_id,
                field: field_name,
                error: e.to_string(),
            });
            return;
        }

        let mut draft = self
            .current
            .clone()
            .unwrap_or_else(|| ReviewDraft::new(self.movie_id));
        if draft.is_submitted() {
            info!(movie_id = %self.movie_id, field = field_name, "Review already submitted, edit ignored");
            self.notify(RepositoryNotice::EditIgnored {
                movie_id: self.movie_id,
                field: field_name,
            });
            return;
        }

        draft.apply(field);
        if let Err(e) = self.store.save(&draft).await {
            warn!(movie_id = %self.movie_id, field = field_name, error = %e, "Failed to persist review edit");
            self.notify(RepositoryNotice::EditNotPersisted {
                movie_id: self.movie_id,
                field: field_name,
                error: e.to_string(),
            });
        }
        self.publish(Some(draft));
    }

    async fn handle_submit(&mut self) -> Result<SubmittedReview, SubmitError> {
        self.ensure_loaded().await?;

        let Some(mut draft) = self.current.clone() else {
            return Err(SubmitError::NotEligible);
        };
        if draft.is_submitted() {
            if let Some(review_id) = draft.review_id.clone() {
                debug!(movie_id = %self.movie_id, "Review already submitted");
                return Ok(SubmittedReview { review_id });
            }
        }
        let Some(payload) = draft.payload() else {
            return Err(SubmitError::NotEligible);
        };

        let Some(credential) = self.auth.credential() else {
            // Remember the intent so the synchronizer submits after sign-in
            if !draft.submit_requested {
                draft.submit_requested = true;
                self.store.save(&draft).await?;
                self.publish(Some(draft));
            }
            info!(movie_id = %self.movie_id, "Not signed in, submission deferred");
            return Err(SubmitError::Unauthenticated);
        };

        draft.mark_pending();
        self.store.save(&draft).await?;
        self.publish(Some(draft.clone()));

        info!(
            movie_id = %self.movie_id,
            operation = "review_submit",
            service = self.remote.service_name(),
            "Submitting review"
        );
        let result = match self.remote.submit(&credential, &payload).await {
            Ok(submitted) => {
                info!(movie_id = %self.movie_id, review_id = %submitted.review_id, "Review submitted");
                draft.mark_submitted(submitted.review_id.clone());
                Ok(submitted)
            }
            Err(RemoteError::Unauthorized) => {
                warn!(movie_id = %self.movie_id, "Credential refused while submitting review");
                draft.mark_failed(FailureKind::Unauthorized);
                Err(SubmitError::Unauthenticated)
            }
            Err(RemoteError::Transient(message)) => {
                warn!(movie_id = %self.movie_id, error = %message, "Review submission failed, will retry");
                draft.mark_failed(FailureKind::Transient);
                Err(SubmitError::RetryableFailure(message))
            }
            Err(RemoteError::Rejected(reason)) => {
                warn!(movie_id = %self.movie_id, reason = %reason, "Review rejected by server");
                draft.mark_failed(FailureKind::Rejected {
                    reason: reason.clone(),
                });
                Err(SubmitError::Rejected(reason))
            }
        };

        // The remote outcome is what the caller needs; a failed write here
        // leaves `Pending` on disk, which reloads as retryable and resends
        // under the same idempotency key.
        if let Err(e) = self.store.save(&draft).await {
            error!(movie_id = %self.movie_id, status = %draft.sync_status, error = %e, "Failed to persist submission outcome");
            self.notify(RepositoryNotice::OutcomeNotPersisted {
                movie_id: self.movie_id,
                status: draft.sync_status,
                error: e.to_string(),
            });
        }
        self.publish(Some(draft));
        result
    }

    async fn handle_discard(&mut self) -> Result<bool, DiscardError> {
        self.ensure_loaded().await?;
        let existed = match &self.current {
            Some(draft) if draft.is_submitted() => return Err(DiscardError::AlreadySubmitted),
            Some(_) => true,
            None => false,
        };
        self.store.delete(self.movie_id).await?;
        self.publish(None);
        info!(movie_id = %self.movie_id, existed, "Review draft discarded");
        Ok(existed)
    }

    async fn handle_seed(&mut self, remote_review: RemoteReview) -> Result<bool, StorageError> {
        self.ensure_loaded().await?;
        if self.current.is_some() {
            debug!(movie_id = %self.movie_id, "Local review exists, remote copy not applied");
            return Ok(false);
        }

        let mut draft = ReviewDraft::new(self.movie_id);
        draft.rating = remote_review.rating;
        draft.what_liked = remote_review.what_liked;
        draft.what_did_not_like = remote_review.what_did_not_like;
        draft.mark_submitted(remote_review.review_id);

        self.store.save(&draft).await?;
        self.publish(Some(draft));
        info!(movie_id = %self.movie_id, "Seeded local review from remote");
        Ok(true)
    }
}
