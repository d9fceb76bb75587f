//! Pokémon TCG API payloads and the set index computed from them.

use crate::models::iso_seconds;
use crate::storage::AppendOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One page of `GET /cards`.
#[derive(Debug, Clone, Deserialize)]
pub struct CardsPage {
    #[serde(default)]
    pub data: Vec<Card>,

    #[serde(default, rename = "totalCount")]
    pub total_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub tcgplayer: Option<TcgPlayer>,
}

/// TCGplayer price block, keyed by finish (`holofoil`, `normal`, `reverseHolofoil`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TcgPlayer {
    #[serde(default)]
    pub prices: BTreeMap<String, Option<FinishPrices>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinishPrices {
    pub low: Option<f64>,
    pub mid: Option<f64>,
    pub high: Option<f64>,
    pub market: Option<f64>,
}

impl Card {
    /// Market price of the first finish, by name, that has one.
    pub fn market_price(&self) -> Option<f64> {
        self.tcgplayer
            .as_ref()?
            .prices
            .values()
            .flatten()
            .find_map(|finish| finish.market.filter(|m| *m > 0.0))
    }
}

/// A card with the market price used for the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedCard {
    pub id: String,
    pub name: String,
    pub market_usd: f64,
}

/// Snapshot written to the set's history document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// UTC, second precision, `+00:00` offset
    pub timestamp: String,
    pub index_usd: f64,
}

impl IndexSnapshot {
    pub fn new(index_usd: f64, at: DateTime<Utc>) -> Self {
        Self { timestamp: iso_seconds(at), index_usd }
    }
}

/// Result of an index run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub set_id: String,
    /// Cards that had a market price
    pub cards_priced: usize,
    /// Highest priced cards, descending
    pub top: Vec<PricedCard>,
    /// `None` when no card in the set had a price
    pub snapshot: Option<IndexSnapshot>,
    pub stored: Option<AppendOutcome>,
}

/// Picks the priced cards, highest first.
pub fn priced_cards(cards: &[Card]) -> Vec<PricedCard> {
    let mut priced: Vec<PricedCard> = cards
        .iter()
        .filter_map(|card| {
            card.market_price().map(|market_usd| PricedCard {
                id: card.id.clone(),
                name: card.name.clone(),
                market_usd,
            })
        })
        .collect();

    priced.sort_by(|a, b| b.market_usd.total_cmp(&a.market_usd));
    priced
}

/// Mean of the `n` highest prices, rounded to cents.
pub fn top_n_average(prices: &[f64], n: usize) -> Option<f64> {
    if prices.is_empty() || n == 0 {
        return None;
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top = &sorted[..n.min(sorted.len())];

    let mean = top.iter().sum::<f64>() / top.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn card(value: serde_json::Value) -> Card {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_market_price_first_finish_by_name() {
        let c = card(json!({
            "id": "sv2-254",
            "name": "Iono",
            "tcgplayer": {
                "url": "https://prices.pokemontcg.io/tcgplayer/sv2-254",
                "prices": {
                    "reverseHolofoil": {"low": 1.0, "market": 3.5},
                    "holofoil": {"low": 80.0, "market": 95.12},
                }
            }
        }));
        assert_eq!(c.market_price(), Some(95.12));
    }

    #[test]
    fn test_market_price_skips_missing() {
        let c = card(json!({
            "id": "sv2-1",
            "name": "Pineco",
            "tcgplayer": {"prices": {"holofoil": null, "normal": {"low": 0.01}, "reverseHolofoil": {"market": 0.12}}}
        }));
        assert_eq!(c.market_price(), Some(0.12));

        assert_eq!(card(json!({"id": "sv2-2", "name": "Forretress"})).market_price(), None);
        assert_eq!(
            card(json!({"id": "sv2-3", "name": "Cacnea", "tcgplayer": {"prices": {"normal": {"market": 0.0}}}}))
                .market_price(),
            None
        );
    }

    #[test]
    fn test_top_n_average() {
        let prices = [1.0, 10.0, 4.0, 7.0, 2.5];
        assert_eq!(top_n_average(&prices, 3), Some(7.0));
        assert_eq!(top_n_average(&prices, 10), Some(4.9));
        assert_eq!(top_n_average(&[1.0, 1.0, 2.0], 3), Some(1.33));
        assert_eq!(top_n_average(&[], 10), None);
        assert_eq!(top_n_average(&prices, 0), None);
    }

    #[test]
    fn test_priced_cards_sorted() {
        let cards = vec![
            card(json!({"id": "a", "name": "A", "tcgplayer": {"prices": {"normal": {"market": 1.0}}}})),
            card(json!({"id": "b", "name": "B"})),
            card(json!({"id": "c", "name": "C", "tcgplayer": {"prices": {"holofoil": {"market": 9.0}}}})),
        ];
        let priced = priced_cards(&cards);
        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].id, "c");
        assert_eq!(priced[1].id, "a");
    }

    #[test]
    fn test_index_snapshot_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(
            serde_json::to_value(IndexSnapshot::new(42.5, at)).unwrap(),
            json!({"timestamp": "2024-01-01T12:00:00+00:00", "index_usd": 42.5})
        );
    }
}
