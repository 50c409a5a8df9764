//! Demo binary: resolve a market from the environment, ingest it, and log
//! reconciled view snapshots until interrupted.
//!
//! Select a market with `MARKET_ENGINE_SLUG` or
//! `MARKET_ENGINE_CONDITION_ID`; with neither set, the most active
//! discovered market is used.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use marketdata_engine::{EngineConfig, MarketDataEngine, MarketQuery, ReconciledView};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env();
    let engine = MarketDataEngine::new(config).context("build engine")?;

    let query = query_from_env();
    let candidates = match engine.discover(20).await {
        Ok(markets) => markets,
        Err(e) => {
            tracing::warn!(error = %e, "market discovery failed, resolving without candidates");
            Vec::new()
        }
    };

    let market = engine
        .resolve(&query, &candidates)
        .await
        .context("resolve market")?;
    tracing::info!(
        condition_id = %market.condition_id,
        question = market.question.as_deref().unwrap_or("<untitled>"),
        tokens = market.token_ids.len(),
        "watching market"
    );

    engine.watch(&market);

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if let Some(view) = engine.view(&market.condition_id) {
                    log_view(&view);
                }
            }
        }
    }

    tracing::info!("shutting down");
    engine.shutdown().await;
    Ok(())
}

fn query_from_env() -> MarketQuery {
    MarketQuery {
        slug: std::env::var("MARKET_ENGINE_SLUG").ok().filter(|s| !s.is_empty()),
        condition_id: std::env::var("MARKET_ENGINE_CONDITION_ID")
            .ok()
            .filter(|s| !s.is_empty()),
    }
}

fn log_view(view: &ReconciledView) {
    let quote = view.quotes.first();
    tracing::info!(
        condition_id = %view.condition_id,
        bid = ?quote.and_then(|q| q.best_bid),
        ask = ?quote.and_then(|q| q.best_ask),
        last = ?quote.and_then(|q| q.last_trade),
        quote_stale = quote.is_none_or(|q| q.stale),
        book_levels = view.book.as_ref().map_or(0, |b| b.book.bids.len() + b.book.asks.len()),
        book_stale = view.book.as_ref().is_none_or(|b| b.stale),
        history_points = view.history.as_ref().map_or(0, |h| h.points.len()),
        holders = view.holders.as_ref().map_or(0, |h| h.holders.len()),
        "view"
    );
}
