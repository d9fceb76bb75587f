//! tcgwatch - Trading card market price tracker
//!
//! Scrapes a card's market price from the TCGplayer search page with a
//! headless browser and appends timestamped snapshots to a capped JSON
//! history in Azure blob storage.

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod storage;
pub mod tcgplayer;

#[cfg(feature = "pokemontcg")]
pub mod pokemontcg;

pub use config::Config;
pub use error::TrackerError;
pub use models::{PriceSnapshot, ScrapeReport};
pub use storage::{History, HistoryAppender};
