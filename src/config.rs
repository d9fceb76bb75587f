//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::error::TrackerError;
use crate::storage::auth::SharedKeyCredential;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name of the tracked item, used for the search and the blob name
    #[serde(default = "default_item_name")]
    pub item_name: String,

    /// Search results page; the item name is appended as `?q=`
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// How the search page is loaded
    #[serde(default)]
    pub backend: Backend,

    /// Browser driven by the WebDriver backend
    #[serde(default)]
    pub browser: BrowserKind,

    /// WebDriver server URL (chromedriver / geckodriver)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// How long to wait for the price element, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between page polls while waiting, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Proxy URL for the HTTP backend (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Price locator settings
    #[serde(default)]
    pub locators: LocatorConfig,

    /// Blob storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Set index settings
    #[cfg(feature = "pokemontcg")]
    #[serde(default)]
    pub index: IndexConfig,
}

fn default_item_name() -> String {
    "Iono".to_string()
}

fn default_search_url() -> String {
    "https://www.tcgplayer.com/search/all/product".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Accepted element wait timeouts, in seconds.
pub const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 8..=20;

fn default_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            item_name: default_item_name(),
            search_url: default_search_url(),
            backend: Backend::default(),
            browser: BrowserKind::default(),
            webdriver_url: default_webdriver_url(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            proxy: None,
            locators: LocatorConfig::default(),
            storage: StorageConfig::default(),
            format: OutputFormat::Table,
            #[cfg(feature = "pokemontcg")]
            index: IndexConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("tcgwatch.toml");
        if local_config.exists() {
            debug!("Found tcgwatch.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("tcgwatch").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(name) = std::env::var("CARD_NAME") {
            if !name.trim().is_empty() {
                self.item_name = name;
            }
        }

        if let Ok(account) = std::env::var("AZURE_STORAGE_ACCOUNT") {
            self.storage.account = Some(account);
        }

        if let Ok(key) = std::env::var("AZURE_STORAGE_KEY") {
            self.storage.access_key = Some(key);
        }

        if let Ok(endpoint) = std::env::var("AZURE_STORAGE_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }

        if let Ok(url) = std::env::var("TCGWATCH_WEBDRIVER_URL") {
            self.webdriver_url = url;
        }

        if let Ok(timeout) = std::env::var("TCGWATCH_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }

        #[cfg(feature = "pokemontcg")]
        if let Ok(key) = std::env::var("POKEMONTCG_API_KEY") {
            self.index.api_key = Some(key);
        }

        self
    }

    /// Returns the element wait timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the delay between page polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks settings that every command depends on.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.item_name.trim().is_empty() {
            return Err(TrackerError::Config("item name must not be empty".to_string()));
        }
        if !TIMEOUT_RANGE_SECS.contains(&self.timeout_secs) {
            return Err(TrackerError::Config(format!(
                "timeout must be between {} and {} seconds, got {}",
                TIMEOUT_RANGE_SECS.start(),
                TIMEOUT_RANGE_SECS.end(),
                self.timeout_secs
            )));
        }
        if self.storage.max_points == 0 {
            return Err(TrackerError::Config("max_points must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// CSS selectors and text hints used to find the market price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Selector whose first match holds the price
    #[serde(default = "default_price_selector")]
    pub price_selector: String,

    /// Elements scanned for the exact label text
    #[serde(default = "default_label_selector")]
    pub label_selector: String,

    /// Label whose next sibling holds the price
    #[serde(default = "default_label_text")]
    pub label_text: String,

    /// Case-insensitive text marking a price block
    #[serde(default = "default_text_needle")]
    pub text_needle: String,

    /// Class-name substrings that identify the value element in a price block
    #[serde(default = "default_value_class_hints")]
    pub value_class_hints: Vec<String>,
}

fn default_price_selector() -> String {
    ".price-point--price".to_string()
}

fn default_label_selector() -> String {
    "span, div, dt, th, td, label".to_string()
}

fn default_label_text() -> String {
    "Market Price".to_string()
}

fn default_text_needle() -> String {
    "market price".to_string()
}

fn default_value_class_hints() -> Vec<String> {
    vec!["price".to_string(), "value".to_string(), "amount".to_string()]
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            price_selector: default_price_selector(),
            label_selector: default_label_selector(),
            label_text: default_label_text(),
            text_needle: default_text_needle(),
            value_class_hints: default_value_class_hints(),
        }
    }
}

/// Blob storage account and history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage account name
    #[serde(default)]
    pub account: Option<String>,

    /// Base64 shared access key
    #[serde(default, skip_serializing)]
    pub access_key: Option<String>,

    /// Endpoint override (emulator, tests); defaults to the account's public endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Container holding the history documents
    #[serde(default = "default_container")]
    pub container: String,

    /// Maximum number of snapshots kept per item
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    /// Guard uploads with the ETag seen at download
    #[serde(default = "default_conditional_writes")]
    pub conditional_writes: bool,
}

fn default_container() -> String {
    "indexes".to_string()
}

fn default_max_points() -> usize {
    500
}

fn default_conditional_writes() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account: None,
            access_key: None,
            endpoint: None,
            container: default_container(),
            max_points: default_max_points(),
            conditional_writes: default_conditional_writes(),
        }
    }
}

impl StorageConfig {
    /// Validates the account credentials; required before any storage access.
    pub fn credential(&self) -> Result<SharedKeyCredential, TrackerError> {
        let account = self
            .account
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| TrackerError::Config("AZURE_STORAGE_ACCOUNT is not set".to_string()))?;

        let key = self
            .access_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TrackerError::Config("AZURE_STORAGE_KEY is not set".to_string()))?;

        SharedKeyCredential::new(account, key)
    }

    /// Returns the blob service endpoint without a trailing slash.
    pub fn endpoint_for(&self, account: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", account),
        }
    }
}

/// Pokémon TCG set index settings.
#[cfg(feature = "pokemontcg")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Set to index (e.g., sv2 = Paldea Evolved)
    #[serde(default = "default_set_id")]
    pub set_id: String,

    /// Number of highest market prices averaged
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key sent as X-Api-Key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[cfg(feature = "pokemontcg")]
fn default_set_id() -> String {
    "sv2".to_string()
}

#[cfg(feature = "pokemontcg")]
fn default_top_n() -> usize {
    10
}

#[cfg(feature = "pokemontcg")]
fn default_api_url() -> String {
    "https://api.pokemontcg.io/v2".to_string()
}

#[cfg(feature = "pokemontcg")]
impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            set_id: default_set_id(),
            top_n: default_top_n(),
            api_url: default_api_url(),
            api_key: None,
        }
    }
}

/// Source of the rendered search page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Headless browser through a WebDriver server
    #[default]
    Webdriver,
    /// Single HTTP GET, no script execution
    Http,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webdriver" | "browser" => Ok(Backend::Webdriver),
            "http" => Ok(Backend::Http),
            _ => Err(format!("Unknown backend: {}. Use: webdriver, http", s)),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Webdriver => write!(f, "webdriver"),
            Backend::Http => write!(f, "http"),
        }
    }
}

/// Browser launched by the WebDriver server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl std::str::FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            _ => Err(format!("Unknown browser: {}. Use: chrome, firefox", s)),
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserKind::Chrome => write!(f, "chrome"),
            BrowserKind::Firefox => write!(f, "firefox"),
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
