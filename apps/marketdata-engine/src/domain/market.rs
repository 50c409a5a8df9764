//! Canonical market records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tradeable market after normalization.
///
/// Produced once by the normalizer from a raw upstream payload and never
/// mutated afterwards; price movement is reflected in the reconciled view,
/// not here. `outcomes` and `token_ids` are always the same length and
/// index-aligned — consumers rely on this to label per-token quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMarket {
    /// Condition identifier. Primary key, immutable once resolved.
    pub condition_id: String,
    /// Upstream market identifier, when the venue reports one separately.
    pub market_id: Option<String>,
    /// Human-readable question.
    pub question: Option<String>,
    /// Outcome labels, index-aligned with `token_ids`.
    pub outcomes: Vec<String>,
    /// Outcome token identifiers, index-aligned with `outcomes`.
    pub token_ids: Vec<String>,
    /// URL slug.
    pub slug: Option<String>,
    /// Trailing 24h volume.
    pub volume_24h: Option<Decimal>,
    /// Trailing 24h price change of the primary outcome.
    pub price_change_24h: Option<Decimal>,
    /// Best bid as reported by discovery, if present.
    pub best_bid: Option<Decimal>,
    /// Best ask as reported by discovery, if present.
    pub best_ask: Option<Decimal>,
}

impl CanonicalMarket {
    /// Token id of the first (primary) outcome.
    pub fn primary_token(&self) -> Option<&str> {
        self.token_ids.first().map(String::as_str)
    }

    /// Outcome label for a token id, using the index alignment invariant.
    pub fn outcome_for_token(&self, token_id: &str) -> Option<&str> {
        let idx = self.token_ids.iter().position(|t| t == token_id)?;
        self.outcomes.get(idx).map(String::as_str)
    }
}
