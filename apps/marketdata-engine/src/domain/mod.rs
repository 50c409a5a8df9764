//! Core data types with no I/O dependencies.

pub mod book;
pub mod events;
pub mod market;
pub mod view;

pub use book::{OrderBookLevel, OrderBookState};
pub use events::{BookSnapshot, ConnectionStatus, StreamEvent, StreamUpdate, UpdateKind};
pub use market::CanonicalMarket;
pub use view::{
    BookView, HistoryView, HolderStake, HoldersView, PricePoint, QuoteSource, QuoteView,
    ReconciledView,
};
