//! Blob storage for price histories.

pub mod appender;
pub mod auth;
pub mod azure;
pub mod history;

use crate::error::TrackerError;
use async_trait::async_trait;

pub use appender::{AppendOutcome, HistoryAppender};
pub use azure::AzureBlobClient;
pub use history::{History, HistoryDecodeError};

/// A downloaded document and the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Precondition attached to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Overwrite whatever is stored.
    Unconditional,
    /// Only overwrite the version with this ETag.
    IfMatch(String),
    /// Only write if no document exists yet.
    IfAbsent,
}

/// Trait for container-scoped blob access - enables mocking for tests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates the container if it does not exist yet.
    async fn ensure_container(&self) -> Result<(), TrackerError>;

    /// Downloads a document; `None` when it does not exist.
    async fn download(&self, name: &str) -> Result<Option<Blob>, TrackerError>;

    /// Uploads a JSON document, replacing any existing one.
    async fn upload(
        &self,
        name: &str,
        body: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<(), TrackerError>;
}

/// Returns the document name for an item's history.
pub fn blob_name(item: &str) -> String {
    format!("{}.json", item)
}
