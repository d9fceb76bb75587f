//! TCGplayer search page scraping: browser sessions, price locators and parsing.

pub mod browser;
pub mod fetcher;
pub mod locators;
pub mod parser;
pub mod webdriver;

pub use browser::{Browser, BrowserSession, HttpBrowser};
pub use fetcher::{FetchedPrice, PriceFetcher};
pub use locators::{LocatorChain, PriceLocator};
pub use parser::parse_market_price;
pub use webdriver::WebDriverBrowser;
