pub mod error;
pub mod record;
pub mod repository;
pub mod store;
pub mod synchronizer;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DiscardError, ReadError, SeedError, StorageError, SubmitError};
pub use record::ReviewRecord;
pub use repository::{RepositoryNotice, ReviewRepository, SeedOutcome, IDLE_WORKER_TIMEOUT};
pub use store::{InMemoryReviewStore, JsonReviewStore, LocalReviewStore};
pub use synchronizer::{ReviewsSynchronizer, SweepReport, SyncState};
