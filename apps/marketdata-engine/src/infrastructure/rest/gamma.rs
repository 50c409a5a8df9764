//! Market discovery API client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::MarketLookup;
use crate::domain::CanonicalMarket;
use crate::infrastructure::http::{FetchError, RequestClient};
use crate::infrastructure::normalize::{alias, normalize_market};

/// Client for the market discovery REST API.
#[derive(Debug, Clone)]
pub struct GammaClient {
    http: Arc<RequestClient>,
    base_url: String,
}

impl GammaClient {
    /// Create a client against `base_url`.
    pub fn new(http: Arc<RequestClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Active markets ordered by 24h volume, for candidate lists.
    pub async fn markets(&self, limit: u32) -> Result<Vec<CanonicalMarket>, FetchError> {
        let raw: Value = self
            .http
            .get_json_query(
                &self.url("/markets"),
                &[
                    ("limit", limit.to_string()),
                    ("active", "true".to_string()),
                    ("closed", "false".to_string()),
                    ("order", "volume24hr".to_string()),
                    ("ascending", "false".to_string()),
                ],
            )
            .await?;
        Ok(markets_in(&raw))
    }

    async fn fetch_first(
        &self,
        query: &[(&str, String)],
    ) -> Result<Option<CanonicalMarket>, FetchError> {
        let raw: Value = self
            .http
            .get_json_query(&self.url("/markets"), query)
            .await?;
        Ok(markets_in(&raw).into_iter().next())
    }
}

#[async_trait]
impl MarketLookup for GammaClient {
    async fn market_by_slug(&self, slug: &str) -> Result<Option<CanonicalMarket>, FetchError> {
        self.fetch_first(&[("slug", slug.to_string())]).await
    }

    async fn event_markets_by_slug(
        &self,
        slug: &str,
    ) -> Result<Vec<CanonicalMarket>, FetchError> {
        let raw: Value = self
            .http
            .get_json_query(&self.url("/events"), &[("slug", slug.to_string())])
            .await?;

        for event in list_in(&raw, &["data", "events"]) {
            let markets: Vec<CanonicalMarket> = alias(event, &["markets"])
                .and_then(Value::as_array)
                .map(|ms| ms.iter().filter_map(normalize_market).collect())
                .unwrap_or_default();
            if !markets.is_empty() {
                return Ok(markets);
            }
        }
        Ok(Vec::new())
    }

    async fn market_by_condition(
        &self,
        condition_id: &str,
    ) -> Result<Option<CanonicalMarket>, FetchError> {
        self.fetch_first(&[("condition_ids", condition_id.to_string())])
            .await
    }
}

/// Markets endpoints answer with a bare array or a `{data: [...]}`
/// envelope depending on API version.
fn list_in<'a>(raw: &'a Value, keys: &[&str]) -> &'a [Value] {
    match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => alias(raw, keys)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    }
}

fn markets_in(raw: &Value) -> Vec<CanonicalMarket> {
    list_in(raw, &["data", "markets"])
        .iter()
        .filter_map(normalize_market)
        .collect()
}
