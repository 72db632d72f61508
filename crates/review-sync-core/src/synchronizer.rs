//! Background submission of reviews the user already asked to send.
//!
//! The synchronizer watches the auth session (and optionally a connectivity
//! signal) and runs a sweep whenever a credential is newly acquired or the
//! network comes back while signed in.

use futures::stream::{self, StreamExt};
use review_sync_config::SyncConfig;
use review_sync_models::MovieId;
use review_sync_remote::{AuthSessionProvider, Credential};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use crate::error::{StorageError, SubmitError};
use crate::repository::ReviewRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    /// Waiting for the user to sign in before anything can be sent
    SigningIn,
    Syncing,
}

/// Tally of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Drafts the sweep tried to submit
    pub attempted: usize,
    pub submitted: usize,
    /// Still failing after the last retry; left for the next trigger
    pub retryable: usize,
    pub rejected: usize,
    pub unauthenticated: usize,
    /// Left out because their credential was refused and no new one arrived
    pub awaiting_sign_in: usize,
    pub not_eligible: usize,
    pub skipped_in_progress: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SweepReport {
    fn record(&mut self, movie_id: MovieId, outcome: &Result<(), SubmitError>) {
        match outcome {
            Ok(()) => self.submitted += 1,
            Err(SubmitError::RetryableFailure(_)) => self.retryable += 1,
            Err(SubmitError::Rejected(_)) => self.rejected += 1,
            Err(SubmitError::Unauthenticated) => self.unauthenticated += 1,
            Err(SubmitError::NotEligible) => self.not_eligible += 1,
            Err(SubmitError::AlreadyInProgress) => self.skipped_in_progress += 1,
            Err(e @ (SubmitError::Storage(_) | SubmitError::Closed)) => {
                self.errors.push(format!("movie {}: {}", movie_id, e));
            }
        }
    }

    /// Drafts that still carry a submit request after this sweep
    pub fn outstanding(&self) -> usize {
        self.retryable + self.unauthenticated + self.awaiting_sign_in + self.errors.len()
    }
}

pub struct ReviewsSynchronizer {
    repository: Arc<ReviewRepository>,
    auth: Arc<dyn AuthSessionProvider>,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
    reports: watch::Sender<Option<SweepReport>>,
    sweep_lock: Mutex<()>,
}

impl ReviewsSynchronizer {
    pub fn new(
        repository: Arc<ReviewRepository>,
        auth: Arc<dyn AuthSessionProvider>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        let (reports, _) = watch::channel(None);
        Self {
            repository,
            auth,
            config,
            state,
            reports,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Latest sweep report; `changed()` fires once per finished sweep
    pub fn reports(&self) -> watch::Receiver<Option<SweepReport>> {
        self.reports.subscribe()
    }

    /// The host sent the user to sign in, e.g. after `Unauthenticated`
    pub fn mark_signing_in(&self) {
        self.state.send_if_modified(|state| {
            if *state == SyncState::Idle {
                *state = SyncState::SigningIn;
                true
            } else {
                false
            }
        });
    }

    fn set_state(&self, next: SyncState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?state, to = ?next, "Synchronizer state change");
            *state = next;
            true
        });
    }

    /// Submit every stored draft that carries a submit request.
    ///
    /// Drafts whose credential the server refused are held back; see
    /// [`ReviewsSynchronizer::sweep_after_sign_in`]. Sweeps never overlap; a
    /// second caller waits for the first to finish.
    pub async fn sweep(&self) -> Result<SweepReport, StorageError> {
        self.sweep_drafts(false).await
    }

    /// Like [`ReviewsSynchronizer::sweep`], but also resends drafts whose
    /// previous credential was refused. Only for a newly acquired credential.
    pub async fn sweep_after_sign_in(&self) -> Result<SweepReport, StorageError> {
        self.sweep_drafts(true).await
    }

    #[instrument(skip(self))]
    async fn sweep_drafts(&self, after_sign_in: bool) -> Result<SweepReport, StorageError> {
        let _guard = self.sweep_lock.lock().await;
        let started = Instant::now();

        let mut candidates = Vec::new();
        let mut awaiting_sign_in = 0;
        for draft in self.repository.list().await? {
            if draft.is_sweep_candidate(after_sign_in) {
                candidates.push(draft.movie_id);
            } else if draft.awaits_sign_in() {
                awaiting_sign_in += 1;
            }
        }

        self.set_state(SyncState::Syncing);
        info!(
            operation = "review_sweep",
            candidates = candidates.len(),
            "Starting review sweep"
        );

        let concurrency = self.config.max_concurrent_submissions.max(1);
        let outcomes: Vec<(MovieId, Result<(), SubmitError>)> = stream::iter(candidates)
            .map(|movie_id| async move { (movie_id, self.submit_with_retry(movie_id).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = SweepReport {
            attempted: outcomes.len(),
            awaiting_sign_in,
            ..SweepReport::default()
        };
        for (movie_id, outcome) in &outcomes {
            report.record(*movie_id, outcome);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            operation = "review_sweep",
            attempted = report.attempted,
            submitted = report.submitted,
            retryable = report.retryable,
            rejected = report.rejected,
            unauthenticated = report.unauthenticated,
            awaiting_sign_in = report.awaiting_sign_in,
            duration_ms = report.duration_ms,
            "Review sweep finished"
        );
        if !report.errors.is_empty() {
            warn!("Review sweep finished with {} error(s)", report.errors.len());
        }

        // Signed out mid-sweep, or a credential was refused
        if report.unauthenticated > 0 || report.awaiting_sign_in > 0 {
            self.set_state(SyncState::SigningIn);
        } else {
            self.set_state(SyncState::Idle);
        }
        self.reports.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// Retries transient failures with exponential backoff. Other outcomes
    /// are final for this sweep.
    async fn submit_with_retry(&self, movie_id: MovieId) -> Result<(), SubmitError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.repository.submit(movie_id).await {
                Ok(submitted) => {
                    debug!(movie_id = %movie_id, review_id = %submitted.review_id, attempt, "Sweep submitted review");
                    return Ok(());
                }
                Err(SubmitError::RetryableFailure(message)) if attempt < max_attempts => {
                    let delay = self.config.backoff_for_attempt(attempt);
                    warn!(
                        movie_id = %movie_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Review submission failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(movie_id = %movie_id, attempt, error = %e, "Sweep left review unsubmitted");
                    return Err(e);
                }
            }
        }
    }

    async fn run_sweep(&self, trigger: &'static str, after_sign_in: bool, cancel: &CancellationToken) {
        info!(trigger, after_sign_in, "Review sweep triggered");
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(trigger, "Review sweep cancelled");
                self.set_state(SyncState::Idle);
            }
            result = self.sweep_drafts(after_sign_in) => {
                if let Err(e) = result {
                    warn!(trigger, error = %e, "Review sweep could not read local reviews");
                    self.set_state(SyncState::Idle);
                }
            }
        }
    }

    /// Start the event loop.
    ///
    /// Both the auth and the connectivity snapshots are taken before the
    /// task starts, so a sign-in or reconnect right after this call is never
    /// missed. `connectivity` carries `true` while the network is reachable,
    /// if the host can tell.
    pub fn spawn(
        self: &Arc<Self>,
        mut connectivity: Option<watch::Receiver<bool>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut auth_rx = self.auth.subscribe();
        let mut credential: Option<Credential> = auth_rx.borrow_and_update().clone();
        let mut online = connectivity
            .as_mut()
            .map_or(true, |rx| *rx.borrow_and_update());

        tokio::spawn(async move {
            if this.config.sweep_on_start && credential.is_some() && online {
                this.run_sweep("startup", false, &cancel).await;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = auth_rx.changed() => {
                        if changed.is_err() {
                            debug!("Auth session closed");
                            break;
                        }
                        let current = auth_rx.borrow_and_update().clone();
                        let acquired = current.is_some() && current != credential;
                        credential = current;

                        if acquired {
                            this.run_sweep("sign_in", true, &cancel).await;
                        } else if credential.is_none() {
                            this.set_state(SyncState::Idle);
                        }
                    }
                    change = connectivity_change(&mut connectivity) => {
                        match change {
                            Some(now_online) => {
                                let regained = now_online && !online;
                                online = now_online;
                                if regained && credential.is_some() {
                                    this.run_sweep("connectivity", false, &cancel).await;
                                }
                            }
                            None => {
                                debug!("Connectivity signal closed");
                                connectivity = None;
                            }
                        }
                    }
                }
            }

            this.set_state(SyncState::Idle);
            info!("Reviews synchronizer stopped");
        })
    }
}

/// Next connectivity value, `None` once the signal is gone. Never resolves
/// when the host provides no signal.
async fn connectivity_change(receiver: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match receiver {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
