//! Resolver fallback chain against a mock discovery API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketdata_engine::infrastructure::rest::GammaClient;
use marketdata_engine::{
    HttpSettings, MarketQuery, MarketResolver, RateLimiter, RequestClient, ResolveError,
};

fn resolver(server: &MockServer) -> MarketResolver<GammaClient> {
    let http = RequestClient::new(
        Arc::new(RateLimiter::disabled()),
        HttpSettings {
            timeout: Duration::from_secs(2),
            retries: 0,
            ..Default::default()
        },
    )
    .expect("build http client");
    MarketResolver::new(GammaClient::new(Arc::new(http), server.uri()))
}

#[tokio::test]
async fn slug_lookup_falls_back_to_event_first_market() {
    let server = MockServer::start().await;

    // Market-by-slug yields nothing usable.
    Mock::given(method("GET"))
        .and(path("/markets"))
        .and(query_param("slug", "super-bowl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Event-by-slug carries the constituent markets.
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("slug", "super-bowl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "slug": "super-bowl",
            "markets": [
                {
                    "conditionId": "c-event-1",
                    "clobTokenIds": "[\"A\",\"B\"]",
                    "outcomes": "[\"Yes\",\"No\"]"
                },
                {"conditionId": "c-event-2", "clobTokenIds": ["C", "D"]}
            ]
        }])))
        .mount(&server)
        .await;

    let market = resolver(&server)
        .resolve(&MarketQuery::by_slug("super-bowl"), &[])
        .await
        .expect("resolved");

    assert_eq!(market.condition_id, "c-event-1");
    assert_eq!(market.token_ids, vec!["A", "B"]);
    assert_eq!(market.outcomes, vec!["Yes", "No"]);
}

#[tokio::test]
async fn upstream_errors_are_swallowed_into_the_next_step() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "markets": [{"conditionId": "c-ok", "clobTokenIds": ["T"]}]
        }])))
        .mount(&server)
        .await;

    let market = resolver(&server)
        .resolve(&MarketQuery::by_slug("anything"), &[])
        .await
        .expect("resolved despite 500");
    assert_eq!(market.condition_id, "c-ok");
}

#[tokio::test]
async fn exhausted_chain_reports_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = resolver(&server)
        .resolve(&MarketQuery::by_slug("ghost"), &[])
        .await
        .expect_err("nothing to resolve");
    assert_eq!(err, ResolveError::NotFound);
}
