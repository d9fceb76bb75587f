//! Scrape command: fetch the market price and append it to the item's history.

use crate::config::Config;
use crate::format::Formatter;
use crate::models::{PriceSnapshot, ScrapeReport};
use crate::storage::{blob_name, AzureBlobClient, BlobStore, HistoryAppender};
use crate::tcgplayer::{browser, Browser, PriceFetcher};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

/// Executes one fetch-and-append run.
pub struct ScrapeCommand {
    config: Config,
}

impl ScrapeCommand {
    /// Creates a new scrape command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs against the configured browser and blob storage and returns formatted output.
    pub async fn execute(&self) -> Result<String> {
        self.config.validate()?;
        // Credentials are checked before a browser is started
        let store = AzureBlobClient::new(&self.config.storage)?;
        let browser = browser::from_config(&self.config)?;

        let report = self.execute_with(browser.as_ref(), &store).await?;
        Ok(Formatter::new(self.config.format).format_scrape(&report))
    }

    /// Runs with a provided browser and store (for testing).
    pub async fn execute_with(
        &self,
        browser: &dyn Browser,
        store: &dyn BlobStore,
    ) -> Result<ScrapeReport> {
        let item = self.config.item_name.trim();

        let fetched = PriceFetcher::new(&self.config)?
            .fetch(browser, item)
            .await
            .with_context(|| format!("fetching market price for {}", item))?;

        let snapshot = PriceSnapshot::new(item, fetched.price, Utc::now());
        let blob = blob_name(item);

        let stored = HistoryAppender::new(store, self.config.storage.max_points)
            .conditional_writes(self.config.storage.conditional_writes)
            .append(&blob, &snapshot)
            .await
            .with_context(|| format!("appending snapshot to {}", blob))?;

        info!("Appended {} at {} to {}", snapshot.price_usd, snapshot.timestamp, blob);

        Ok(ScrapeReport { snapshot, strategy: fetched.strategy.to_string(), stored })
    }
}
