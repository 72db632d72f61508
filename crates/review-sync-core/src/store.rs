use async_trait::async_trait;
use review_sync_models::{MovieId, ReviewDraft};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::error::StorageError;
use crate::record::ReviewRecord;

/// Durable per-movie review storage.
///
/// Reads never touch the network. `save` must be atomic with respect to a
/// concurrent `load`: readers see the old record or the new one.
#[async_trait]
pub trait LocalReviewStore: Send + Sync {
    async fn load(&self, movie_id: MovieId) -> Result<Option<ReviewDraft>, StorageError>;

    /// Every stored review, ordered by movie id
    async fn load_all(&self) -> Result<Vec<ReviewDraft>, StorageError>;

    /// Insert or replace by movie id
    async fn save(&self, draft: &ReviewDraft) -> Result<(), StorageError>;

    /// Removing a missing record is not an error
    async fn delete(&self, movie_id: MovieId) -> Result<(), StorageError>;
}

/// One pretty-printed JSON file per movie
pub struct JsonReviewStore {
    dir: PathBuf,
}

impl JsonReviewStore {
    pub fn new(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, movie_id: MovieId) -> PathBuf {
        self.dir.join(format!("{}.json", movie_id))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<ReviewRecord>, StorageError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<ReviewRecord>(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Keep the unreadable file around for manual recovery and
                // carry on as if nothing was stored
                let backup_path = path.with_extension("json.bak");
                if let Err(backup_err) = tokio::fs::rename(path, &backup_path).await {
                    warn!(
                        "Failed to back up unreadable review record {:?}: {}",
                        path, backup_err
                    );
                    return Err(e.into());
                }
                warn!(
                    "Review record {:?} is unreadable ({}). Moved it to {:?}.",
                    path, e, backup_path
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl LocalReviewStore for JsonReviewStore {
    async fn load(&self, movie_id: MovieId) -> Result<Option<ReviewDraft>, StorageError> {
        let record = self.read_record(&self.record_path(movie_id)).await?;
        debug!(movie_id = %movie_id, found = record.is_some(), "Loaded review record");
        Ok(record.map(ReviewRecord::into_draft))
    }

    async fn load_all(&self) -> Result<Vec<ReviewDraft>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut drafts = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let is_movie_file = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map_or(false, |stem| stem.parse::<MovieId>().is_ok());
            if !is_movie_file {
                continue;
            }
            if let Some(record) = self.read_record(&path).await? {
                drafts.push(record.into_draft());
            }
        }

        drafts.sort_by_key(|d| d.movie_id);
        Ok(drafts)
    }

    async fn save(&self, draft: &ReviewDraft) -> Result<(), StorageError> {
        let path = self.record_path(draft.movie_id);
        let json = serde_json::to_string_pretty(&ReviewRecord::from(draft))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(movie_id = %draft.movie_id, status = %draft.sync_status, "Saved review record");
        Ok(())
    }

    async fn delete(&self, movie_id: MovieId) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.record_path(movie_id)).await {
            Ok(()) => {
                info!(movie_id = %movie_id, "Deleted review record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store; records go through the same row schema as on disk
#[derive(Default)]
pub struct InMemoryReviewStore {
    records: RwLock<HashMap<MovieId, ReviewRecord>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LocalReviewStore for InMemoryReviewStore {
    async fn load(&self, movie_id: MovieId) -> Result<Option<ReviewDraft>, StorageError> {
        Ok(self
            .records
            .read()
            .await
            .get(&movie_id)
            .cloned()
            .map(ReviewRecord::into_draft))
    }

    async fn load_all(&self) -> Result<Vec<ReviewDraft>, StorageError> {
        let mut drafts: Vec<ReviewDraft> = self
            .records
            .read()
            .await
            .values()
            .cloned()
            .map(ReviewRecord::into_draft)
            .collect();
        drafts.sort_by_key(|d| d.movie_id);
        Ok(drafts)
    }

    async fn save(&self, draft: &ReviewDraft) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(draft.movie_id, ReviewRecord::from(draft));
        Ok(())
    }

    async fn delete(&self, movie_id: MovieId) -> Result<(), StorageError> {
        self.records.write().await.remove(&movie_id);
        Ok(())
    }
}
