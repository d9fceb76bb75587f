//! Read-modify-write of one item's history document.

use super::history::History;
use super::{BlobStore, WriteCondition};
use crate::error::TrackerError;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// Document that was written
    pub blob: String,
    /// Entries stored after the append
    pub entries: usize,
    /// Oldest entries dropped to respect the cap
    pub dropped: usize,
    /// True if no usable history existed before
    pub started_fresh: bool,
}

/// Appends snapshots to capped JSON histories in a blob container.
pub struct HistoryAppender<'a> {
    store: &'a dyn BlobStore,
    max_points: usize,
    conditional_writes: bool,
}

impl<'a> HistoryAppender<'a> {
    /// Creates an appender over a store.
    pub fn new(store: &'a dyn BlobStore, max_points: usize) -> Self {
        Self { store, max_points, conditional_writes: true }
    }

    /// Enables or disables ETag-guarded uploads.
    pub fn conditional_writes(mut self, enabled: bool) -> Self {
        self.conditional_writes = enabled;
        self
    }

    /// Appends one snapshot to the named document and uploads the whole history.
    pub async fn append<T: Serialize + Sync>(
        &self,
        blob: &str,
        snapshot: &T,
    ) -> Result<AppendOutcome, TrackerError> {
        self.store.ensure_container().await?;

        let (mut history, condition) = self.load(blob).await;
        let started_fresh = history.is_empty();

        let dropped = history.push(snapshot).map_err(|e| TrackerError::StorageWrite {
            blob: blob.to_string(),
            message: format!("failed to encode snapshot: {}", e),
        })?;
        if dropped > 0 {
            debug!("Dropped {} oldest entries from {}", dropped, blob);
        }

        let body = history.to_json().map_err(|e| TrackerError::StorageWrite {
            blob: blob.to_string(),
            message: format!("failed to encode history: {}", e),
        })?;

        let condition = if self.conditional_writes { condition } else { WriteCondition::Unconditional };
        self.store.upload(blob, body, condition).await?;

        info!("Wrote {} entries to {}", history.len(), blob);

        Ok(AppendOutcome { blob: blob.to_string(), entries: history.len(), dropped, started_fresh })
    }

    /// Downloads the current history, falling back to empty.
    ///
    /// A missing document is expected on the first run and is silent. An
    /// unreadable or undecodable one is logged as a warning because the
    /// upcoming write replaces it.
    async fn load(&self, blob: &str) -> (History, WriteCondition) {
        match self.store.download(blob).await {
            Ok(None) => {
                debug!("No history at {}, starting a new one", blob);
                (History::new(self.max_points), WriteCondition::IfAbsent)
            }
            Ok(Some(doc)) => {
                let condition = match doc.etag {
                    Some(etag) => WriteCondition::IfMatch(etag),
                    None => WriteCondition::Unconditional,
                };

                match History::from_json(&doc.body, self.max_points) {
                    Ok(history) => {
                        debug!("Loaded {} entries from {}", history.len(), blob);
                        (history, condition)
                    }
                    Err(e) => {
                        warn!("History at {} is unusable ({}); it will be replaced", blob, e);
                        (History::new(self.max_points), condition)
                    }
                }
            }
            Err(e) => {
                warn!("{}; continuing with an empty history", e);
                (History::new(self.max_points), WriteCondition::IfAbsent)
            }
        }
    }

    /// Reads a history without modifying it; every failure is an error.
    pub async fn read(&self, blob: &str) -> Result<Option<History>, TrackerError> {
        let Some(doc) = self.store.download(blob).await? else {
            return Ok(None);
        };

        History::from_json(&doc.body, self.max_points)
            .map(Some)
            .map_err(|e| TrackerError::StorageRead { blob: blob.to_string(), message: e.to_string() })
    }
}
