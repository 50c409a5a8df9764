//! Holders API client.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::HolderStake;
use crate::infrastructure::http::{FetchError, RequestClient};
use crate::infrastructure::normalize::normalize_holders;

/// Client for the holders/trades REST API.
#[derive(Debug, Clone)]
pub struct DataApiClient {
    http: Arc<RequestClient>,
    base_url: String,
}

impl DataApiClient {
    /// Create a client against `base_url`.
    pub fn new(http: Arc<RequestClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Largest holders for a market, all outcome tokens flattened.
    pub async fn holders(
        &self,
        condition_id: &str,
        limit: u32,
    ) -> Result<Vec<HolderStake>, FetchError> {
        let url = format!("{}/holders", self.base_url.trim_end_matches('/'));
        let raw: Value = self
            .http
            .get_json_query(
                &url,
                &[
                    ("market", condition_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(normalize_holders(&raw))
    }
}
