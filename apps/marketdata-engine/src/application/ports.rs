//! Ports consumed by application services.

use async_trait::async_trait;

use crate::domain::CanonicalMarket;
use crate::infrastructure::http::FetchError;

/// Market discovery lookups used by the resolver's fallback chain.
///
/// Implementations return already-normalized records; an un-normalizable
/// upstream payload is simply absent from the result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketLookup: Send + Sync {
    /// Look a market up by its URL slug.
    async fn market_by_slug(&self, slug: &str) -> Result<Option<CanonicalMarket>, FetchError>;

    /// Look an event up by slug and return its constituent markets.
    async fn event_markets_by_slug(&self, slug: &str)
    -> Result<Vec<CanonicalMarket>, FetchError>;

    /// Look a market up by its condition identifier.
    async fn market_by_condition(
        &self,
        condition_id: &str,
    ) -> Result<Option<CanonicalMarket>, FetchError>;
}
