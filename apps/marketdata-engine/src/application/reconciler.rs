//! State reconciliation: merging REST snapshots and stream deltas.
//!
//! Per market, four independently-aged sub-states: live quotes
//! (stream-preferred), order book, price history, and holders (REST-fed).
//! The precedence policy is "last writer wins per source priority": a
//! stream update always lands immediately, while a REST value may not
//! clobber a stream value younger than the configured priority window —
//! REST responses can be seconds old by the time they arrive.
//!
//! The reconciler makes no presentation decisions; it only exposes per
//! sub-state staleness flags so the consumer can degrade panels itself.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::{
    BookSnapshot, BookView, CanonicalMarket, HistoryView, HolderStake, HoldersView,
    OrderBookState, PricePoint, QuoteSource, QuoteView, ReconciledView, StreamUpdate,
};
use crate::infrastructure::config::StalenessSettings;

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Live quote staleness threshold.
    pub quote_stale_after: Duration,
    /// Order book staleness threshold.
    pub book_stale_after: Duration,
    /// Price history staleness threshold.
    pub history_stale_after: Duration,
    /// Holder list staleness threshold.
    pub holders_stale_after: Duration,
    /// A REST quote may not overwrite a stream quote younger than this.
    pub stream_priority_window: Duration,
    /// Maximum retained history points (rolling window, oldest out).
    pub history_capacity: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from_staleness(&StalenessSettings::default())
    }
}

impl ReconcilerSettings {
    /// Map configuration thresholds into reconciler settings.
    pub fn from_staleness(staleness: &StalenessSettings) -> Self {
        Self {
            quote_stale_after: staleness.quote,
            book_stale_after: staleness.book,
            history_stale_after: staleness.history,
            holders_stale_after: staleness.holders,
            stream_priority_window: staleness.stream_priority_window,
            history_capacity: 2880,
        }
    }
}

#[derive(Debug)]
struct QuoteState {
    best_bid: Option<rust_decimal::Decimal>,
    best_ask: Option<rust_decimal::Decimal>,
    last_trade: Option<rust_decimal::Decimal>,
    source: QuoteSource,
    updated_at: Instant,
}

#[derive(Debug)]
struct BookState {
    asset_id: String,
    book: OrderBookState,
    updated_at: Instant,
}

#[derive(Debug)]
struct SeriesState {
    points: Vec<PricePoint>,
    updated_at: Instant,
}

#[derive(Debug)]
struct HoldersState {
    holders: Vec<HolderStake>,
    updated_at: Instant,
}

#[derive(Debug)]
struct MarketState {
    market: CanonicalMarket,
    quotes: HashMap<String, QuoteState>,
    book: Option<BookState>,
    history: Option<SeriesState>,
    holders: Option<HoldersState>,
}

/// Merges REST snapshots and stream deltas into one view per market.
#[derive(Debug)]
pub struct StateReconciler {
    settings: ReconcilerSettings,
    markets: HashMap<String, MarketState>,
    token_index: HashMap<String, String>,
}

impl StateReconciler {
    /// Create a reconciler.
    pub fn new(settings: ReconcilerSettings) -> Self {
        Self {
            settings,
            markets: HashMap::new(),
            token_index: HashMap::new(),
        }
    }

    /// Register a market so its tokens route to its view.
    pub fn register_market(&mut self, market: &CanonicalMarket) {
        for token in &market.token_ids {
            self.token_index
                .insert(token.clone(), market.condition_id.clone());
        }
        self.markets
            .entry(market.condition_id.clone())
            .or_insert_with(|| MarketState {
                market: market.clone(),
                quotes: HashMap::new(),
                book: None,
                history: None,
                holders: None,
            });
    }

    /// Condition ids of every registered market.
    pub fn condition_ids(&self) -> Vec<String> {
        self.markets.keys().cloned().collect()
    }

    /// Apply a live delta. Stream values always win immediately.
    pub fn apply_stream_update(&mut self, update: &StreamUpdate) {
        let Some(state) = self.market_for_token_mut(&update.asset_id) else {
            tracing::debug!(asset_id = %update.asset_id, "update for unknown asset");
            return;
        };

        let quote = state
            .quotes
            .entry(update.asset_id.clone())
            .or_insert_with(|| QuoteState {
                best_bid: None,
                best_ask: None,
                last_trade: None,
                source: QuoteSource::Stream,
                updated_at: update.received_at,
            });

        if update.best_bid.is_some() {
            quote.best_bid = update.best_bid;
        }
        if update.best_ask.is_some() {
            quote.best_ask = update.best_ask;
        }
        if update.last_trade.is_some() {
            quote.last_trade = update.last_trade;
        }
        quote.source = QuoteSource::Stream;
        quote.updated_at = update.received_at;
    }

    /// Apply a stream book snapshot: refreshes the book sub-state (for the
    /// market's primary token) and the asset's quote from top-of-book.
    pub fn apply_stream_book(&mut self, snapshot: &BookSnapshot) {
        let best_bid = snapshot.book.best_bid().map(|l| l.price);
        let best_ask = snapshot.book.best_ask().map(|l| l.price);

        let Some(state) = self.market_for_token_mut(&snapshot.asset_id) else {
            tracing::debug!(asset_id = %snapshot.asset_id, "book for unknown asset");
            return;
        };

        let quote = state
            .quotes
            .entry(snapshot.asset_id.clone())
            .or_insert_with(|| QuoteState {
                best_bid: None,
                best_ask: None,
                last_trade: None,
                source: QuoteSource::Stream,
                updated_at: snapshot.received_at,
            });
        if best_bid.is_some() {
            quote.best_bid = best_bid;
        }
        if best_ask.is_some() {
            quote.best_ask = best_ask;
        }
        quote.source = QuoteSource::Stream;
        quote.updated_at = snapshot.received_at;

        state.book = Some(BookState {
            asset_id: snapshot.asset_id.clone(),
            book: snapshot.book.clone(),
            updated_at: snapshot.received_at,
        });
    }

    /// Apply a REST book poll: always refreshes the book sub-state, and
    /// refreshes the asset's quote only if the stream has been quiet for
    /// longer than the priority window.
    pub fn apply_rest_book(&mut self, condition_id: &str, asset_id: &str, book: OrderBookState) {
        let now = Instant::now();
        let window = self.settings.stream_priority_window;
        let Some(state) = self.markets.get_mut(condition_id) else {
            return;
        };

        let best_bid = book.best_bid().map(|l| l.price);
        let best_ask = book.best_ask().map(|l| l.price);

        match state.quotes.get_mut(asset_id) {
            Some(quote)
                if quote.source == QuoteSource::Stream && quote.updated_at.elapsed() < window =>
            {
                // A fresher stream value exists; the slow REST response
                // must not clobber it.
                tracing::trace!(asset_id, "rest quote suppressed by fresher stream value");
            }
            Some(quote) => {
                quote.best_bid = best_bid;
                quote.best_ask = best_ask;
                quote.source = QuoteSource::Rest;
                quote.updated_at = now;
            }
            None => {
                state.quotes.insert(
                    asset_id.to_string(),
                    QuoteState {
                        best_bid,
                        best_ask,
                        last_trade: None,
                        source: QuoteSource::Rest,
                        updated_at: now,
                    },
                );
            }
        }

        state.book = Some(BookState {
            asset_id: asset_id.to_string(),
            book,
            updated_at: now,
        });
    }

    /// Replace the price history series, keeping at most the configured
    /// number of newest points.
    pub fn apply_history(&mut self, condition_id: &str, mut points: Vec<PricePoint>) {
        let capacity = self.settings.history_capacity;
        let Some(state) = self.markets.get_mut(condition_id) else {
            return;
        };
        points.sort_by_key(|p| p.ts);
        if points.len() > capacity {
            points.drain(..points.len() - capacity);
        }
        state.history = Some(SeriesState {
            points,
            updated_at: Instant::now(),
        });
    }

    /// Replace the holder list.
    pub fn apply_holders(&mut self, condition_id: &str, holders: Vec<HolderStake>) {
        let Some(state) = self.markets.get_mut(condition_id) else {
            return;
        };
        state.holders = Some(HoldersState {
            holders,
            updated_at: Instant::now(),
        });
    }

    /// Snapshot the reconciled view of one market.
    pub fn view(&self, condition_id: &str) -> Option<ReconciledView> {
        let state = self.markets.get(condition_id)?;
        let settings = &self.settings;

        // Quotes in token order, so labels stay aligned for consumers.
        let quotes = state
            .market
            .token_ids
            .iter()
            .filter_map(|token| {
                let quote = state.quotes.get(token)?;
                let age = quote.updated_at.elapsed();
                Some(QuoteView {
                    asset_id: token.clone(),
                    best_bid: quote.best_bid,
                    best_ask: quote.best_ask,
                    last_trade: quote.last_trade,
                    source: quote.source,
                    age,
                    stale: age > settings.quote_stale_after,
                })
            })
            .collect();

        let book = state.book.as_ref().map(|b| {
            let age = b.updated_at.elapsed();
            BookView {
                asset_id: b.asset_id.clone(),
                book: b.book.clone(),
                age,
                stale: age > settings.book_stale_after,
            }
        });

        let history = state.history.as_ref().map(|h| {
            let age = h.updated_at.elapsed();
            HistoryView {
                points: h.points.clone(),
                age,
                stale: age > settings.history_stale_after,
            }
        });

        let holders = state.holders.as_ref().map(|h| {
            let age = h.updated_at.elapsed();
            HoldersView {
                holders: h.holders.clone(),
                age,
                stale: age > settings.holders_stale_after,
            }
        });

        Some(ReconciledView {
            condition_id: condition_id.to_string(),
            as_of: chrono::Utc::now(),
            quotes,
            book,
            history,
            holders,
        })
    }

    fn market_for_token_mut(&mut self, asset_id: &str) -> Option<&mut MarketState> {
        let condition_id = self.token_index.get(asset_id)?;
        self.markets.get_mut(condition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderBookLevel, UpdateKind};
    use rust_decimal_macros::dec;

    fn market() -> CanonicalMarket {
        CanonicalMarket {
            condition_id: "c1".to_string(),
            market_id: None,
            question: None,
            outcomes: vec!["YES".to_string(), "NO".to_string()],
            token_ids: vec!["tok-yes".to_string(), "tok-no".to_string()],
            slug: None,
            volume_24h: None,
            price_change_24h: None,
            best_bid: None,
            best_ask: None,
        }
    }

    fn stream_update(bid: &str, ask: &str) -> StreamUpdate {
        StreamUpdate {
            asset_id: "tok-yes".to_string(),
            kind: UpdateKind::BestBidAsk,
            best_bid: bid.parse().ok(),
            best_ask: ask.parse().ok(),
            last_trade: None,
            received_at: Instant::now(),
        }
    }

    fn book(bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> OrderBookState {
        OrderBookState {
            bids: vec![OrderBookLevel {
                price: bid,
                size: dec!(10),
            }],
            asks: vec![OrderBookLevel {
                price: ask,
                size: dec!(10),
            }],
            ..Default::default()
        }
    }

    fn reconciler(settings: ReconcilerSettings) -> StateReconciler {
        let mut r = StateReconciler::new(settings);
        r.register_market(&market());
        r
    }

    #[test]
    fn stream_update_lands_immediately() {
        let mut r = reconciler(ReconcilerSettings::default());
        r.apply_stream_update(&stream_update("0.40", "0.42"));

        let view = r.view("c1").unwrap();
        let quote = view.quote("tok-yes").unwrap();
        assert_eq!(quote.best_bid, Some(dec!(0.40)));
        assert_eq!(quote.source, QuoteSource::Stream);
        assert!(!quote.stale);
    }

    #[test]
    fn rest_poll_does_not_clobber_fresh_stream_quote() {
        let mut r = reconciler(ReconcilerSettings::default());
        r.apply_stream_update(&stream_update("0.40", "0.42"));

        // A REST book arriving afterwards carries an older picture.
        r.apply_rest_book("c1", "tok-yes", book(dec!(0.30), dec!(0.35)));

        let view = r.view("c1").unwrap();
        let quote = view.quote("tok-yes").unwrap();
        assert_eq!(quote.best_bid, Some(dec!(0.40)));
        assert_eq!(quote.source, QuoteSource::Stream);
        // The book sub-state itself is REST-owned and does refresh.
        assert_eq!(
            view.book.unwrap().book.best_bid().map(|l| l.price),
            Some(dec!(0.30))
        );
    }

    #[test]
    fn rest_poll_fills_in_when_stream_is_quiet() {
        let settings = ReconcilerSettings {
            stream_priority_window: Duration::ZERO,
            ..Default::default()
        };
        let mut r = reconciler(settings);
        r.apply_stream_update(&stream_update("0.40", "0.42"));

        // Zero priority window: the stream value is already "old".
        r.apply_rest_book("c1", "tok-yes", book(dec!(0.55), dec!(0.60)));

        let quote_view = r.view("c1").unwrap();
        let quote = quote_view.quote("tok-yes").unwrap();
        assert_eq!(quote.best_bid, Some(dec!(0.55)));
        assert_eq!(quote.source, QuoteSource::Rest);
    }

    #[test]
    fn rest_poll_seeds_a_quote_when_none_exists() {
        let mut r = reconciler(ReconcilerSettings::default());
        r.apply_rest_book("c1", "tok-yes", book(dec!(0.48), dec!(0.52)));

        let view = r.view("c1").unwrap();
        let quote = view.quote("tok-yes").unwrap();
        assert_eq!(quote.best_ask, Some(dec!(0.52)));
        assert_eq!(quote.source, QuoteSource::Rest);
    }

    #[test]
    fn stream_book_refreshes_quote_and_book() {
        let mut r = reconciler(ReconcilerSettings::default());
        r.apply_stream_book(&BookSnapshot {
            asset_id: "tok-yes".to_string(),
            book: book(dec!(0.44), dec!(0.46)),
            received_at: Instant::now(),
        });

        let view = r.view("c1").unwrap();
        assert_eq!(
            view.quote("tok-yes").unwrap().best_bid,
            Some(dec!(0.44))
        );
        assert_eq!(view.book.unwrap().asset_id, "tok-yes");
    }

    #[test]
    fn updates_for_unknown_assets_are_ignored() {
        let mut r = reconciler(ReconcilerSettings::default());
        let mut update = stream_update("0.1", "0.2");
        update.asset_id = "unknown".to_string();
        r.apply_stream_update(&update);

        let view = r.view("c1").unwrap();
        assert!(view.quotes.is_empty());
    }

    #[test]
    fn history_keeps_a_rolling_window_of_newest_points() {
        let settings = ReconcilerSettings {
            history_capacity: 3,
            ..Default::default()
        };
        let mut r = reconciler(settings);
        let points: Vec<PricePoint> = (0..10)
            .map(|i| PricePoint {
                ts: i,
                price: dec!(0.5),
            })
            .collect();
        r.apply_history("c1", points);

        let history = r.view("c1").unwrap().history.unwrap();
        assert_eq!(history.points.len(), 3);
        assert_eq!(history.points[0].ts, 7);
        assert_eq!(history.points[2].ts, 9);
    }

    #[test]
    fn sub_states_age_independently() {
        let settings = ReconcilerSettings {
            quote_stale_after: Duration::from_millis(5),
            holders_stale_after: Duration::from_secs(600),
            ..Default::default()
        };
        let mut r = reconciler(settings);
        r.apply_stream_update(&stream_update("0.40", "0.42"));
        r.apply_holders(
            "c1",
            vec![HolderStake {
                address: "0xaa".to_string(),
                name: None,
                amount: dec!(5),
            }],
        );

        std::thread::sleep(Duration::from_millis(20));

        let view = r.view("c1").unwrap();
        assert!(view.quote("tok-yes").unwrap().stale);
        assert!(!view.holders.unwrap().stale);
    }
}
