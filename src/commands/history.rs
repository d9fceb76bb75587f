//! History command: show stored snapshots for an item.

use crate::config::Config;
use crate::format::Formatter;
use crate::storage::{blob_name, AzureBlobClient, BlobStore, HistoryAppender};
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

/// Executes a read-only history lookup.
pub struct HistoryCommand {
    config: Config,
}

impl HistoryCommand {
    /// Creates a new history command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Reads the configured item's history and returns formatted output.
    pub async fn execute(&self, limit: Option<usize>) -> Result<String> {
        self.config.validate()?;
        let store = AzureBlobClient::new(&self.config.storage)?;

        let entries = self.execute_with(&store, limit).await?;
        Ok(Formatter::new(self.config.format).format_history(self.config.item_name.trim(), &entries))
    }

    /// Reads with a provided store (for testing). Returns the newest `limit` entries, oldest first.
    pub async fn execute_with(&self, store: &dyn BlobStore, limit: Option<usize>) -> Result<Vec<Value>> {
        let blob = blob_name(self.config.item_name.trim());

        let history = HistoryAppender::new(store, self.config.storage.max_points)
            .read(&blob)
            .await
            .with_context(|| format!("reading history from {}", blob))?;

        let Some(history) = history else {
            info!("No history stored at {}", blob);
            return Ok(Vec::new());
        };

        let entries = history.entries();
        let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
        Ok(entries[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::storage::{Blob, WriteCondition};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedStore(Option<&'static str>);

    #[async_trait]
    impl BlobStore for FixedStore {
        async fn ensure_container(&self) -> Result<(), TrackerError> {
            Ok(())
        }

        async fn download(&self, _name: &str) -> Result<Option<Blob>, TrackerError> {
            Ok(self.0.map(|body| Blob { body: body.as_bytes().to_vec(), etag: None }))
        }

        async fn upload(&self, _: &str, _: Vec<u8>, _: WriteCondition) -> Result<(), TrackerError> {
            panic!("history is read-only")
        }
    }

    const STORED: &str = r#"[
        {"timestamp":"2024-01-01T00:00:00.000Z","card_name":"Iono","price_usd":0.40},
        {"timestamp":"2024-01-02T00:00:00.000Z","card_name":"Iono","price_usd":0.41},
        {"timestamp":"2024-01-03T00:00:00.000Z","card_name":"Iono","price_usd":0.42}
    ]"#;

    #[tokio::test]
    async fn test_limit_keeps_newest() {
        let command = HistoryCommand::new(Config::default());
        let entries = command.execute_with(&FixedStore(Some(STORED)), Some(2)).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["price_usd"], json!(0.41));
        assert_eq!(entries[1]["price_usd"], json!(0.42));

        let all = command.execute_with(&FixedStore(Some(STORED)), None).await.unwrap();
        assert_eq!(all.len(), 3);

        let over = command.execute_with(&FixedStore(Some(STORED)), Some(10)).await.unwrap();
        assert_eq!(over.len(), 3);
    }

    #[tokio::test]
    async fn test_absent_history_is_empty() {
        let command = HistoryCommand::new(Config::default());
        assert!(command.execute_with(&FixedStore(None), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_is_an_error() {
        let command = HistoryCommand::new(Config::default());
        let err = command.execute_with(&FixedStore(Some("<html>")), None).await.unwrap_err();
        assert!(format!("{:#}", err).contains("reading history from Iono.json"));
    }
}
