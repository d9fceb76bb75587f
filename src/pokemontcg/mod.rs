//! Pokémon TCG API integration for set price indexes.
//!
//! Averages the highest TCGplayer market prices in a set and appends the
//! result to the set's history, alongside the single-card histories.

mod client;
mod models;

pub use client::{CardSource, PokemonTcgClient};
pub use models::{
    priced_cards, top_n_average, Card, CardsPage, FinishPrices, IndexReport, IndexSnapshot,
    PricedCard, TcgPlayer,
};
