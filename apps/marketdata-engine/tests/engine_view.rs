//! End-to-end engine test: REST polls and stream deltas reconciled into
//! one view, then a clean shutdown.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketdata_engine::{
    ApiEndpoints, CanonicalMarket, EngineConfig, HttpSettings, MarketDataEngine, QuoteSource,
    RefreshSettings, StalenessSettings, StreamSettings,
};

fn market() -> CanonicalMarket {
    CanonicalMarket {
        condition_id: "c1".to_string(),
        market_id: None,
        question: Some("Will it rain?".to_string()),
        outcomes: vec!["YES".to_string(), "NO".to_string()],
        token_ids: vec!["tok-yes".to_string(), "tok-no".to_string()],
        slug: None,
        volume_24h: None,
        price_change_24h: None,
        best_bid: None,
        best_ask: None,
    }
}

fn config(rest_uri: &str, stream_url: &str) -> EngineConfig {
    EngineConfig {
        endpoints: ApiEndpoints {
            gamma_base: rest_uri.to_string(),
            clob_base: rest_uri.to_string(),
            data_api_base: rest_uri.to_string(),
            stream_url: stream_url.to_string(),
        },
        http: HttpSettings {
            timeout: Duration::from_secs(2),
            retries: 0,
            ..Default::default()
        },
        stream: StreamSettings {
            stale_after: Duration::from_secs(10),
            watchdog_tick: Duration::from_millis(100),
            reconnect_delay_initial: Duration::from_millis(50),
            reconnect_delay_max: Duration::from_millis(200),
            reconnect_jitter: Duration::from_millis(10),
        },
        refresh: RefreshSettings {
            book_interval: Duration::from_millis(100),
            history_interval: Duration::from_millis(200),
            holders_interval: Duration::from_millis(200),
            history_range: "1d".to_string(),
            history_fidelity: 10,
            holders_limit: 5,
        },
        staleness: StalenessSettings::default(),
        rate_limits: Vec::new(),
    }
}

async fn mount_rest(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/book"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bids": [["0.30", "100"], ["0.29", "40"]],
            "asks": [["0.35", "25"]],
            "tick_size": "0.01"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/prices-history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [{"t": 1_700_000_000, "p": 0.5}, {"t": 1_700_000_600, "p": 0.52}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/holders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"token": "tok-yes", "holders": [{"proxyWallet": "0xaa", "amount": "42"}]}
        ])))
        .mount(server)
        .await;
}

/// A WebSocket server that sends one quote delta for `tok-yes` on each
/// connection, then keeps the connection open.
fn spawn_stream_server(listener: TcpListener) {
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                // Consume the subscribe frame.
                let _ = ws.next().await;
                let frame = json!({
                    "event_type": "last_trade_price",
                    "asset_id": "tok-yes",
                    "price": "0.61",
                    "best_bid": "0.60",
                    "best_ask": "0.62"
                })
                .to_string();
                if ws.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
                // Hold the connection open; echo nothing further.
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });
}

#[tokio::test]
async fn engine_reconciles_rest_and_stream_into_one_view() {
    let rest = MockServer::start().await;
    mount_rest(&rest).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let stream_url = format!("ws://{}", listener.local_addr().expect("addr"));
    spawn_stream_server(listener);

    let engine = MarketDataEngine::new(config(&rest.uri(), &stream_url)).expect("engine");
    let market = market();
    engine.watch(&market);

    // Give the polls and the stream a few cycles.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let view = engine.view("c1").expect("view exists");

    // Stream delta won the quote to the yes-token.
    let quote = view.quote("tok-yes").expect("quote present");
    assert_eq!(quote.last_trade, Some(dec!(0.61)));
    assert_eq!(quote.source, QuoteSource::Stream);
    assert!(!quote.stale);

    // REST-owned sub-states arrived on their own cadences.
    let book = view.book.expect("book present");
    assert_eq!(book.book.bids.len(), 2);
    assert_eq!(book.book.best_ask().map(|l| l.price), Some(dec!(0.35)));
    assert!(!book.stale);

    let history = view.history.expect("history present");
    assert_eq!(history.points.len(), 2);

    let holders = view.holders.expect("holders present");
    assert_eq!(holders.holders.len(), 1);
    assert_eq!(holders.holders[0].address, "0xaa");

    // Shutdown stops every background task promptly and is idempotent.
    tokio::time::timeout(Duration::from_secs(5), engine.shutdown())
        .await
        .expect("shutdown hung");
    tokio::time::timeout(Duration::from_secs(1), engine.shutdown())
        .await
        .expect("second shutdown hung");
}

#[tokio::test]
async fn fresh_stream_quote_survives_slow_rest_polls() {
    let rest = MockServer::start().await;
    mount_rest(&rest).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let stream_url = format!("ws://{}", listener.local_addr().expect("addr"));
    spawn_stream_server(listener);

    let engine = MarketDataEngine::new(config(&rest.uri(), &stream_url)).expect("engine");
    engine.watch(&market());

    tokio::time::sleep(Duration::from_millis(600)).await;

    // Book polls kept firing every 100ms with bid 0.30, but the stream
    // value (0.60/0.62) is younger than the priority window and must not
    // have been clobbered.
    let view = engine.view("c1").expect("view exists");
    let quote = view.quote("tok-yes").expect("quote present");
    assert_eq!(quote.best_bid, Some(dec!(0.60)));
    assert_eq!(quote.best_ask, Some(dec!(0.62)));
    assert_eq!(quote.source, QuoteSource::Stream);

    engine.shutdown().await;
}
