//! Snapshot records written to the history documents.

use crate::storage::AppendOutcome;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped market price observation for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// UTC, millisecond precision, `Z` suffix
    pub timestamp: String,
    pub card_name: String,
    pub price_usd: f64,
}

impl PriceSnapshot {
    /// Creates a snapshot taken at `at`.
    pub fn new(card_name: impl Into<String>, price_usd: f64, at: DateTime<Utc>) -> Self {
        Self { timestamp: iso_millis(at), card_name: card_name.into(), price_usd }
    }
}

/// What a scrape run fetched and stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeReport {
    pub snapshot: PriceSnapshot,
    /// Locator that found the price
    pub strategy: String,
    pub stored: AppendOutcome,
}

/// Formats a time as `2024-01-01T00:00:00.000Z`.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats a time as `2024-01-01T00:00:00+00:00`.
pub fn iso_seconds(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}
