#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::default_trait_access
    )
)]

//! Market Data Engine - Resilient Ingestion Core
//!
//! Ingests live market data from three independently-versioned,
//! loosely-specified REST APIs and one WebSocket feed, and maintains a
//! consistent, continuously-refreshed view of a market's price, order
//! book, history, and holders for a presentation layer to consume.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: canonical records and event types
//!   - `market`, `book`: normalized market and order book records
//!   - `events`: stream event tagged union
//!   - `view`: the reconciled read model
//!
//! - **Application**: use cases
//!   - `resolver`: slug/id -> canonical market, with fallback chain
//!   - `reconciler`: REST/stream merge policy and staleness flags
//!   - `engine`: the façade wiring everything together
//!
//! - **Infrastructure**: adapters
//!   - `ratelimit`: fixed-window token buckets per endpoint class
//!   - `http`: rate-limited, retrying JSON client
//!   - `normalize`: schema normalization for drifting payload shapes
//!   - `rest`: typed clients for the three REST services
//!   - `stream`: self-healing WebSocket client
//!
//! # Data Flow
//!
//! ```text
//! discovery REST ──► resolver ──► CanonicalMarket
//!                                      │
//!                  ┌───────────────────┴──────────────────┐
//!                  ▼                                      ▼
//!        WebSocket stream                    REST polls (book/history/holders)
//!                  │                                      │
//!                  └────────────► reconciler ◄────────────┘
//!                                      │
//!                                      ▼
//!                               ReconciledView
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - core data types with no I/O dependencies.
pub mod domain;

/// Application layer - use cases and ports.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{
    BookSnapshot, CanonicalMarket, ConnectionStatus, HolderStake, OrderBookLevel, OrderBookState,
    PricePoint, QuoteSource, ReconciledView, StreamEvent, StreamUpdate, UpdateKind,
};

// Application services
pub use application::{
    MarketDataEngine, MarketLookup, MarketQuery, MarketResolver, ReconcilerSettings,
    ResolveError, StateReconciler,
};

// Infrastructure config
pub use infrastructure::config::{
    ApiEndpoints, EngineConfig, RefreshSettings, StalenessSettings, StreamSettings,
};

// HTTP client and error taxonomy
pub use infrastructure::http::{FetchError, HttpSettings, RequestClient};

// Rate limiting
pub use infrastructure::ratelimit::{RateLimiter, RateRule};

// Streaming client
pub use infrastructure::stream::{MarketStream, StreamHandle};
