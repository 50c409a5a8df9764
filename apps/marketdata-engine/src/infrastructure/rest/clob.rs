//! Order book / price history API client.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{OrderBookState, PricePoint};
use crate::infrastructure::http::{FetchError, RequestClient};
use crate::infrastructure::normalize::{normalize_book, normalize_history};

/// Client for the order book and price REST API.
#[derive(Debug, Clone)]
pub struct ClobClient {
    http: Arc<RequestClient>,
    base_url: String,
}

impl ClobClient {
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

    /// Current order book for one outcome token. `None` when the venue
    /// answers with something that is not a book.
    pub async fn order_book(&self, token_id: &str) -> Result<Option<OrderBookState>, FetchError> {
        let raw: Value = self
            .http
            .get_json_query(&self.url("/book"), &[("token_id", token_id.to_string())])
            .await?;
        Ok(normalize_book(&raw))
    }

    /// Price history for one outcome token over `range` (e.g. `1d`) at
    /// `fidelity` minutes per point.
    pub async fn price_history(
        &self,
        token_id: &str,
        range: &str,
        fidelity: u32,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let raw: Value = self
            .http
            .get_json_query(
                &self.url("/prices-history"),
                &[
                    ("market", token_id.to_string()),
                    ("interval", range.to_string()),
                    ("fidelity", fidelity.to_string()),
                ],
            )
            .await?;
        Ok(normalize_history(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::HttpSettings;
    use crate::infrastructure::ratelimit::RateLimiter;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clob(server: &MockServer) -> ClobClient {
        let http = RequestClient::new(
            Arc::new(RateLimiter::disabled()),
            HttpSettings {
                retries: 0,
                ..Default::default()
            },
        )
        .unwrap();
        ClobClient::new(Arc::new(http), server.uri())
    }

    #[tokio::test]
    async fn book_is_normalized_and_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book"))
            .and(query_param("token_id", "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bids": [{"price": "0.39", "size": "50"}, {"price": "0.4", "size": "100"}],
                "asks": [{"price": "0.45", "size": "0"}, {"price": "0.44", "size": "10"}],
                "min_order_size": "5",
                "tick_size": "0.01"
            })))
            .mount(&server)
            .await;

        let book = clob(&server).order_book("tok-1").await.unwrap().unwrap();
        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(0.4)));
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.min_order_size, Some(dec!(5)));
    }

    #[tokio::test]
    async fn history_points_are_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prices-history"))
            .and(query_param("market", "tok-1"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "history": [{"t": 1700000000, "p": 0.52}, {"t": 1700000600, "p": "0.55"}]
            })))
            .mount(&server)
            .await;

        let points = clob(&server).price_history("tok-1", "1d", 10).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].price, dec!(0.55));
    }
}
