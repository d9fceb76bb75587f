//! Browser seam: a launcher that opens sessions, and the sessions themselves.

use crate::config::{Backend, Config};
use crate::error::TrackerError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

use super::webdriver::WebDriverBrowser;

/// Trait for starting browser sessions - enables mocking for tests.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Starts a new session.
    async fn open(&self) -> Result<Box<dyn BrowserSession>, TrackerError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// A live browser session. Callers must call `close` exactly once.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates to a URL and waits for the document to load.
    async fn goto(&mut self, url: &str) -> Result<(), TrackerError>;

    /// Returns the current page source, including script-rendered content.
    async fn source(&mut self) -> Result<String, TrackerError>;

    /// Whether the page can change after load; static pages are read once.
    fn renders_scripts(&self) -> bool {
        true
    }

    /// Releases the session.
    async fn close(&mut self) -> Result<(), TrackerError>;
}

/// Creates the browser configured by `backend`.
pub fn from_config(config: &Config) -> Result<Box<dyn Browser>, TrackerError> {
    match config.backend {
        Backend::Webdriver => Ok(Box::new(WebDriverBrowser::new(&config.webdriver_url, config.browser))),
        Backend::Http => Ok(Box::new(HttpBrowser::new(config)?)),
    }
}

/// Plain HTTP "browser" with TLS fingerprint emulation; scripts never run.
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    /// Creates an HTTP browser with the configured proxy.
    pub fn new(config: &Config) -> Result<Self, TrackerError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url)
                .map_err(|e| TrackerError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TrackerError::Session(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, TrackerError> {
        Ok(Box::new(HttpSession { client: self.client.clone(), page: None }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct HttpSession {
    client: Client,
    page: Option<String>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn goto(&mut self, url: &str) -> Result<(), TrackerError> {
        debug!("GET {}", url);

        let navigation_error =
            |message: String| TrackerError::Navigation { url: url.to_string(), message };

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| navigation_error(format!("failed to send request: {}", e)))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(navigation_error(format!("status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(format!("failed to read response body: {}", e)))?;
        self.page = Some(body);
        Ok(())
    }

    async fn source(&mut self) -> Result<String, TrackerError> {
        self.page.clone().ok_or_else(|| TrackerError::Session("no page loaded".to_string()))
    }

    fn renders_scripts(&self) -> bool {
        false
    }

    async fn close(&mut self) -> Result<(), TrackerError> {
        self.page = None;
        Ok(())
    }
}
