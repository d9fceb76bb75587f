//! CLI command implementations.

pub mod history;
pub mod price;
pub mod scrape;

#[cfg(feature = "pokemontcg")]
pub mod index;

pub use history::HistoryCommand;
pub use price::PriceCommand;
pub use scrape::ScrapeCommand;

#[cfg(feature = "pokemontcg")]
pub use index::IndexCommand;
