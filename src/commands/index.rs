//! Set index command: average the top market prices in a set and append the result.

use crate::config::Config;
use crate::format::Formatter;
use crate::pokemontcg::{
    priced_cards, top_n_average, CardSource, IndexReport, IndexSnapshot, PokemonTcgClient,
};
use crate::storage::{blob_name, AzureBlobClient, BlobStore, HistoryAppender};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

/// Executes one index run for the configured set.
pub struct IndexCommand {
    config: Config,
}

impl IndexCommand {
    /// Creates a new index command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs against the Pokémon TCG API and blob storage and returns formatted output.
    pub async fn execute(&self) -> Result<String> {
        self.config.validate()?;
        let store = AzureBlobClient::new(&self.config.storage)?;
        let source = PokemonTcgClient::new(&self.config.index)?;

        let report = self.execute_with(&source, &store).await?;
        Ok(Formatter::new(self.config.format).format_index(&report))
    }

    /// Runs with a provided card source and store (for testing).
    pub async fn execute_with(
        &self,
        source: &dyn CardSource,
        store: &dyn BlobStore,
    ) -> Result<IndexReport> {
        let set_id = self.config.index.set_id.trim();
        let top_n = self.config.index.top_n;

        let cards = source
            .cards_in_set(set_id)
            .await
            .with_context(|| format!("fetching cards for set {}", set_id))?;

        let priced = priced_cards(&cards);
        let prices: Vec<f64> = priced.iter().map(|c| c.market_usd).collect();

        let mut report = IndexReport {
            set_id: set_id.to_string(),
            cards_priced: priced.len(),
            top: priced.into_iter().take(top_n).collect(),
            snapshot: None,
            stored: None,
        };

        let Some(index_usd) = top_n_average(&prices, top_n) else {
            info!("No prices found for set {}", set_id);
            return Ok(report);
        };

        let snapshot = IndexSnapshot::new(index_usd, Utc::now());
        let blob = blob_name(set_id);

        let stored = HistoryAppender::new(store, self.config.storage.max_points)
            .conditional_writes(self.config.storage.conditional_writes)
            .append(&blob, &snapshot)
            .await
            .with_context(|| format!("appending snapshot to {}", blob))?;

        info!("Appended index {} for set {} to {}", index_usd, set_id, blob);

        report.snapshot = Some(snapshot);
        report.stored = Some(stored);
        Ok(report)
    }
}
