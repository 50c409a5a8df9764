//! Market resolution: from a slug or opaque identifier to a canonical
//! market descriptor.
//!
//! A linear fallback chain. Every step's failure — an upstream error or an
//! empty result — means "try the next step", never propagation; the only
//! error a caller can see is [`ResolveError::NotFound`] once the whole
//! chain is exhausted.

use crate::domain::CanonicalMarket;

use super::ports::MarketLookup;

/// What the caller knows about the market it wants.
#[derive(Debug, Clone, Default)]
pub struct MarketQuery {
    /// URL slug, when the market was referenced by link.
    pub slug: Option<String>,
    /// Condition identifier, when already known.
    pub condition_id: Option<String>,
}

impl MarketQuery {
    /// Query by slug.
    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            condition_id: None,
        }
    }

    /// Query by condition identifier.
    pub fn by_condition(condition_id: impl Into<String>) -> Self {
        Self {
            slug: None,
            condition_id: Some(condition_id.into()),
        }
    }
}

/// Resolution failure: the entire chain yielded nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No strategy produced a usable market.
    #[error("no market matched the query")]
    NotFound,
}

/// Resolves market queries through an ordered chain of lookup strategies.
#[derive(Debug)]
pub struct MarketResolver<L> {
    lookup: L,
}

impl<L: MarketLookup> MarketResolver<L> {
    /// Create a resolver over a lookup backend.
    pub const fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolve `query`, falling back to `candidates` (an already-loaded
    /// market list) when direct lookups yield nothing.
    pub async fn resolve(
        &self,
        query: &MarketQuery,
        candidates: &[CanonicalMarket],
    ) -> Result<CanonicalMarket, ResolveError> {
        if let Some(slug) = query.slug.as_deref() {
            match self.lookup.market_by_slug(slug).await {
                Ok(Some(market)) => return Ok(market),
                Ok(None) => tracing::debug!(slug, "no market for slug, trying event lookup"),
                Err(e) => tracing::debug!(slug, error = %e, "slug lookup failed, trying event lookup"),
            }

            match self.lookup.event_markets_by_slug(slug).await {
                Ok(markets) => {
                    if let Some(market) = markets.into_iter().next() {
                        tracing::debug!(slug, condition_id = %market.condition_id, "resolved via event");
                        return Ok(market);
                    }
                    tracing::debug!(slug, "event lookup empty");
                }
                Err(e) => tracing::debug!(slug, error = %e, "event lookup failed"),
            }
        }

        if let Some(condition_id) = query.condition_id.as_deref() {
            match self.lookup.market_by_condition(condition_id).await {
                Ok(Some(market)) => return Ok(market),
                Ok(None) => tracing::debug!(condition_id, "no market for condition id"),
                Err(e) => tracing::debug!(condition_id, error = %e, "condition lookup failed"),
            }

            if let Some(market) = candidates.iter().find(|m| m.condition_id == condition_id) {
                return Ok(market.clone());
            }
        }

        candidates.first().cloned().ok_or(ResolveError::NotFound)
    }
}
