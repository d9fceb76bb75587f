//! Price command: fetch the market price without storing it.

use crate::config::Config;
use crate::format::Formatter;
use crate::tcgplayer::{browser, Browser, FetchedPrice, PriceFetcher};
use anyhow::{Context, Result};

/// Executes a read-only price lookup.
pub struct PriceCommand {
    config: Config,
}

impl PriceCommand {
    /// Creates a new price command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Fetches the configured item's price and returns formatted output.
    pub async fn execute(&self) -> Result<String> {
        self.config.validate()?;
        let browser = browser::from_config(&self.config)?;

        let fetched = self.execute_with(browser.as_ref()).await?;
        Ok(Formatter::new(self.config.format).format_price(&fetched))
    }

    /// Fetches with a provided browser (for testing).
    pub async fn execute_with(&self, browser: &dyn Browser) -> Result<FetchedPrice> {
        let item = self.config.item_name.trim();

        PriceFetcher::new(&self.config)?
            .fetch(browser, item)
            .await
            .with_context(|| format!("fetching market price for {}", item))
    }
}
