//! Order book types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price level of an order book.
///
/// Levels with a zero price or zero size never reach this type; the
/// normalizer filters them out (upstream uses zero to mean "not present").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// Outcome price, in `[0, 1]`.
    pub price: Decimal,
    /// Resting quantity at this price.
    pub size: Decimal,
}

/// A normalized order book for one outcome token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookState {
    /// Bid levels, sorted descending by price.
    pub bids: Vec<OrderBookLevel>,
    /// Ask levels, sorted ascending by price.
    pub asks: Vec<OrderBookLevel>,
    /// Minimum order size accepted by the venue, when reported.
    pub min_order_size: Option<Decimal>,
    /// Price increment for this market, when reported.
    pub tick_size: Option<Decimal>,
    /// Whether the market participates in negative-risk conversion.
    pub neg_risk: bool,
}

impl OrderBookState {
    /// Highest bid level, if any.
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    /// Lowest ask level, if any.
    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    /// Midpoint between best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::TWO)
    }

    /// Best-ask minus best-bid.
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some(ask - bid)
    }

    /// True when neither side has any level.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> OrderBookLevel {
        OrderBookLevel { price, size }
    }

    #[test]
    fn best_levels_and_mid() {
        let book = OrderBookState {
            bids: vec![level(dec!(0.55), dec!(10)), level(dec!(0.50), dec!(4))],
            asks: vec![level(dec!(0.60), dec!(2)), level(dec!(0.65), dec!(7))],
            ..Default::default()
        };

        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(0.55)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(0.60)));
        assert_eq!(book.mid_price(), Some(dec!(0.575)));
        assert_eq!(book.spread(), Some(dec!(0.05)));
    }

    #[test]
    fn empty_book_has_no_quotes() {
        let book = OrderBookState::default();
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.mid_price().is_none());
    }
}
