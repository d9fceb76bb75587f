//! HTTP client for the Pokémon TCG API.

use super::models::{Card, CardsPage};
use crate::config::IndexConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use wreq::Client;

const PAGE_SIZE: usize = 250;

/// Trait for card lookups - enables mocking for tests.
#[async_trait]
pub trait CardSource: Send + Sync {
    /// Returns every card in a set.
    async fn cards_in_set(&self, set_id: &str) -> Result<Vec<Card>>;
}

/// Pokémon TCG API client.
pub struct PokemonTcgClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PokemonTcgClient {
    /// Creates a client from the index settings.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        Self::with_base_url(config.api_url.clone(), config.api_key.clone())
    }

    /// Creates a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: String, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }

    async fn fetch_page(&self, set_id: &str, page: u32) -> Result<CardsPage> {
        let query = format!("set.id:{}", set_id);
        let url = format!(
            "{}/cards?q={}&pageSize={}&page={}",
            self.base_url,
            urlencoding::encode(&query),
            PAGE_SIZE,
            page
        );
        debug!("GET {}", url);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            anyhow::bail!("Pokémon TCG API returned status: {}", response.status());
        }

        let body = response.text().await.context("Failed to read response body")?;
        serde_json::from_str(&body).context("Failed to parse cards page")
    }
}

#[async_trait]
impl CardSource for PokemonTcgClient {
    async fn cards_in_set(&self, set_id: &str) -> Result<Vec<Card>> {
        info!("Fetching cards for set {}", set_id);

        let mut cards = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(set_id, page).await?;
            let received = batch.data.len();
            debug!("Page {}: {} cards (total {:?})", page, received, batch.total_count);

            if received == 0 {
                break;
            }
            cards.extend(batch.data);

            let done = match batch.total_count {
                Some(total) => cards.len() >= total,
                None => received < PAGE_SIZE,
            };
            if done {
                break;
            }
            page += 1;
        }

        info!("Fetched {} cards for set {}", cards.len(), set_id);
        Ok(cards)
    }
}
