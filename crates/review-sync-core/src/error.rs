use review_sync_remote::RemoteError;
use thiserror::Error;

/// Local persistence failures, passed through to callers unmodified
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("review storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("review record could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a movie's review could not be read through the repository
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("review repository has shut down")]
    Closed,
}

/// Why `ReviewRepository::submit` did not end with an acknowledged review.
///
/// The first three are usage outcomes rather than system failures.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("review needs a rating and at least one comment before it can be submitted")]
    NotEligible,
    #[error("sign in to submit this review")]
    Unauthenticated,
    #[error("a submission for this movie is already in progress")]
    AlreadyInProgress,
    #[error("review could not be sent and will be retried: {0}")]
    RetryableFailure(String),
    #[error("review rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("review repository has shut down")]
    Closed,
}

#[derive(Debug, Error)]
pub enum DiscardError {
    #[error("submitted reviews cannot be discarded")]
    AlreadySubmitted,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("review repository has shut down")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("sign in to fetch your reviews")]
    Unauthenticated,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("review repository has shut down")]
    Closed,
}
