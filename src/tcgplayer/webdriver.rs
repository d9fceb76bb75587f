//! Headless browser sessions through a WebDriver server.

use super::browser::{Browser, BrowserSession};
use crate::config::BrowserKind;
use crate::error::TrackerError;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// Launches sessions on a running chromedriver or geckodriver.
pub struct WebDriverBrowser {
    webdriver_url: String,
    kind: BrowserKind,
}

impl WebDriverBrowser {
    pub fn new(webdriver_url: impl Into<String>, kind: BrowserKind) -> Self {
        Self { webdriver_url: webdriver_url.into(), kind }
    }

    /// Session capabilities requesting a headless, sandbox-free browser.
    fn capabilities(&self) -> Map<String, Value> {
        let caps = match self.kind {
            BrowserKind::Chrome => json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": ["--headless=new", "--no-sandbox", "--disable-gpu", "--window-size=1280,900"]
                }
            }),
            BrowserKind::Firefox => json!({
                "browserName": "firefox",
                "moz:firefoxOptions": { "args": ["-headless"] }
            }),
        };

        match caps {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, TrackerError> {
        debug!("Connecting to WebDriver at {}", self.webdriver_url);

        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder.connect(&self.webdriver_url).await.map_err(|e| {
            TrackerError::Session(format!(
                "could not start {} session at {}: {}",
                self.kind, self.webdriver_url, e
            ))
        })?;

        info!("Started headless {} session", self.kind);
        Ok(Box::new(WebDriverSession { client: Some(client) }))
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}

struct WebDriverSession {
    client: Option<Client>,
}

impl WebDriverSession {
    fn client(&self) -> Result<&Client, TrackerError> {
        self.client.as_ref().ok_or_else(|| TrackerError::Session("session already closed".to_string()))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<(), TrackerError> {
        debug!("Navigating to {}", url);
        self.client()?
            .goto(url)
            .await
            .map_err(|e| TrackerError::Navigation { url: url.to_string(), message: e.to_string() })
    }

    async fn source(&mut self) -> Result<String, TrackerError> {
        self.client()?
            .source()
            .await
            .map_err(|e| TrackerError::Session(format!("failed to read page source: {}", e)))
    }

    async fn close(&mut self) -> Result<(), TrackerError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        debug!("Closing WebDriver session");
        client
            .close()
            .await
            .map_err(|e| TrackerError::Session(format!("failed to close session: {}", e)))
    }
}
