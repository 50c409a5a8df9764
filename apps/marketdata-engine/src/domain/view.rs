//! Read model exposed to the presentation layer.
//!
//! A [`ReconciledView`] is a point-in-time snapshot of independently-aged
//! sub-states. Each carries its own staleness flag so the presentation can
//! degrade per panel; no rendering decisions are made here.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::OrderBookState;

/// Where the current quote fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Low-latency WebSocket delta.
    Stream,
    /// Periodic REST snapshot.
    Rest,
}

/// A point on the price history series, unix seconds and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp, seconds.
    pub ts: i64,
    /// Outcome price at that time.
    pub price: Decimal,
}

/// One holder of an outcome position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderStake {
    /// On-chain address of the holder.
    pub address: String,
    /// Display name, when the venue knows one.
    pub name: Option<String>,
    /// Position size.
    pub amount: Decimal,
}

/// Live quote for one outcome token.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteView {
    /// Outcome token the quote refers to.
    pub asset_id: String,
    /// Current best bid.
    pub best_bid: Option<Decimal>,
    /// Current best ask.
    pub best_ask: Option<Decimal>,
    /// Most recent trade price.
    pub last_trade: Option<Decimal>,
    /// Which source last wrote the quote fields.
    pub source: QuoteSource,
    /// Time since the last update.
    pub age: Duration,
    /// True when `age` exceeds the configured quote threshold.
    pub stale: bool,
}

/// Order book sub-state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BookView {
    /// Outcome token the book belongs to.
    pub asset_id: String,
    /// The book itself.
    pub book: OrderBookState,
    /// Time since the last refresh.
    pub age: Duration,
    /// True when `age` exceeds the configured book threshold.
    pub stale: bool,
}

/// Price history sub-state snapshot (rolling in-memory window).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    /// Points, oldest first.
    pub points: Vec<PricePoint>,
    /// Time since the last refresh.
    pub age: Duration,
    /// True when `age` exceeds the configured history threshold.
    pub stale: bool,
}

/// Holder list sub-state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldersView {
    /// Largest holders, as last reported.
    pub holders: Vec<HolderStake>,
    /// Time since the last refresh.
    pub age: Duration,
    /// True when `age` exceeds the configured holders threshold.
    pub stale: bool,
}

/// The merged, read-only view of one market.
#[derive(Debug, Clone)]
pub struct ReconciledView {
    /// Condition identifier of the market.
    pub condition_id: String,
    /// Wall-clock time the snapshot was taken.
    pub as_of: chrono::DateTime<chrono::Utc>,
    /// Per-token live quotes.
    pub quotes: Vec<QuoteView>,
    /// Primary-token order book, when one has been fetched.
    pub book: Option<BookView>,
    /// Primary-token price history, when fetched.
    pub history: Option<HistoryView>,
    /// Holder list, when fetched.
    pub holders: Option<HoldersView>,
}

impl ReconciledView {
    /// Quote for a specific token.
    pub fn quote(&self, asset_id: &str) -> Option<&QuoteView> {
        self.quotes.iter().find(|q| q.asset_id == asset_id)
    }
}
