//! Price text parsing.

use crate::error::TrackerError;
use regex_lite::Regex;
use std::sync::LazyLock;

/// Digits with optional thousands separators and an optional fractional part.
static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

/// Extracts the first decimal number from text like `"$1,234.56"`.
pub fn extract_price(text: &str) -> Option<f64> {
    let found = PRICE_PATTERN.find(text)?;
    let normalized = found.as_str().replace(',', "");
    normalized.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Parses the market price of `item` from located element text.
///
/// Zero and unparseable values are both rejected: the page shows a
/// placeholder rather than a price in those cases.
pub fn parse_market_price(item: &str, text: &str) -> Result<f64, TrackerError> {
    match extract_price(text) {
        Some(price) if price > 0.0 => Ok(price),
        _ => Err(TrackerError::Parse { item: item.to_string(), text: text.to_string() }),
    }
}
