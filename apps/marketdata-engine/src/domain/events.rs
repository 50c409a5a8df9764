//! Events emitted by the streaming client.
//!
//! Consumers receive these over an `mpsc` channel rather than registering
//! callbacks; within one connection they arrive in the order the frames
//! were received.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use super::book::OrderBookState;

/// What kind of delta a [`StreamUpdate`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Top-of-book quote moved.
    BestBidAsk,
    /// A trade printed.
    LastTradePrice,
    /// A resting level changed price.
    PriceChange,
}

/// A single live delta for one outcome token.
///
/// Ephemeral: applied to the reconciled view immediately and not retained.
#[derive(Debug, Clone)]
pub struct StreamUpdate {
    /// Outcome token the update refers to.
    pub asset_id: String,
    /// Delta kind.
    pub kind: UpdateKind,
    /// New best bid, when the frame carried one.
    pub best_bid: Option<Decimal>,
    /// New best ask, when the frame carried one.
    pub best_ask: Option<Decimal>,
    /// Last trade price, when the frame carried one.
    pub last_trade: Option<Decimal>,
    /// When the frame was received locally.
    pub received_at: Instant,
}

/// A full order book snapshot delivered over the stream.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    /// Outcome token the book belongs to.
    pub asset_id: String,
    /// The normalized book.
    pub book: OrderBookState,
    /// When the frame was received locally.
    pub received_at: Instant,
}

/// Connection status of a streaming client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Transport is being established.
    #[default]
    Connecting,
    /// Transport open and subscribed.
    Connected,
    /// No frames within the staleness threshold; force-closing.
    Stale,
    /// Terminal: closed by the caller.
    Closed,
    /// Transport-level failure; a reconnect is pending.
    Error,
}

/// Everything a streaming client reports to its consumer.
///
/// Transport failures never surface as `Err` — they arrive here, so a
/// long-lived consumer cannot be crashed by a flaky upstream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Transport opened and the subscribe frame was sent.
    Connected,
    /// A reconnect was scheduled; `attempt` counts since the last success.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
    /// A live delta.
    Update(StreamUpdate),
    /// A full book snapshot.
    Book(BookSnapshot),
    /// No frames for longer than the staleness threshold; the transport
    /// is being force-closed and a reconnect follows.
    Stale {
        /// How long the connection had been silent.
        silent_for: Duration,
    },
    /// Terminal close requested by the caller.
    Closed,
    /// A non-fatal problem: frame parse failure or transport error.
    Error(String),
}
