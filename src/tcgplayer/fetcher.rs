//! Loads the search page and waits for a market price to appear.

use super::browser::{Browser, BrowserSession};
use super::locators::{Located, LocatorChain};
use super::parser::parse_market_price;
use crate::config::Config;
use crate::error::TrackerError;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A market price read from the search page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedPrice {
    pub item: String,
    pub price: f64,
    /// Raw element text the price was parsed from
    pub text: String,
    /// Locator that matched
    pub strategy: &'static str,
    pub url: String,
}

/// Fetches market prices through a browser.
pub struct PriceFetcher {
    search_url: String,
    locators: LocatorChain,
    timeout: Duration,
    poll_interval: Duration,
}

impl PriceFetcher {
    /// Creates a fetcher from configuration.
    pub fn new(config: &Config) -> Result<Self, TrackerError> {
        Ok(Self {
            search_url: config.search_url.clone(),
            locators: LocatorChain::from_config(&config.locators)?,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        })
    }

    /// Overrides the wait timeout and poll interval.
    pub fn with_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Builds the search URL for an item.
    pub fn search_url(&self, item: &str) -> String {
        let separator = if self.search_url.contains('?') { '&' } else { '?' };
        format!("{}{}q={}", self.search_url, separator, urlencoding::encode(item))
    }

    /// Fetches the market price of `item`.
    ///
    /// The session is always closed, whether or not a price was found. A
    /// failure to close is logged and does not replace the fetch result.
    pub async fn fetch(&self, browser: &dyn Browser, item: &str) -> Result<FetchedPrice, TrackerError> {
        let url = self.search_url(item);
        info!("Fetching market price for {} via {}", item, browser.name());

        let mut session = browser.open().await?;
        let result = self.fetch_in(session.as_mut(), item, &url).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        result
    }

    async fn fetch_in(
        &self,
        session: &mut dyn BrowserSession,
        item: &str,
        url: &str,
    ) -> Result<FetchedPrice, TrackerError> {
        session.goto(url).await?;

        let located = self.wait_for_price(session, item).await?;
        debug!("Located {:?} with {}", located.text, located.strategy);

        let price = parse_market_price(item, &located.text)?;
        info!("Market price for {}: ${:.2}", item, price);

        Ok(FetchedPrice {
            item: item.to_string(),
            price,
            text: located.text,
            strategy: located.strategy,
            url: url.to_string(),
        })
    }

    /// Polls the page source until a locator matches or the timeout elapses.
    async fn wait_for_price(
        &self,
        session: &mut dyn BrowserSession,
        item: &str,
    ) -> Result<Located, TrackerError> {
        let deadline = Instant::now().checked_add(self.timeout).ok_or_else(|| {
            TrackerError::Config(format!("wait timeout {:?} is out of range", self.timeout))
        })?;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let html = session.source().await?;
            if let Some(located) = self.locators.locate_html(&html) {
                return Ok(located);
            }

            // Static pages never change after load
            if !session.renders_scripts() || Instant::now() >= deadline {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }

        debug!("No locator matched after {} attempts", attempts);
        Err(TrackerError::ElementNotFound { item: item.to_string(), timeout_secs: self.timeout.as_secs() })
    }
}
