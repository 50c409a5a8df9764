//! The engine service: wires resolver, stream, REST pollers, and the
//! reconciler behind one façade for the presentation layer.
//!
//! One WebSocket connection serves every watched market; watching another
//! market subscribes its tokens incrementally on the live connection.
//! Each watched market additionally gets three REST poll loops (book,
//! history, holders) at their configured cadences. Poll failures degrade
//! the affected sub-state to stale; they never stop the loops.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::{CanonicalMarket, ConnectionStatus, ReconciledView, StreamEvent};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::http::{FetchError, RequestClient};
use crate::infrastructure::ratelimit::RateLimiter;
use crate::infrastructure::rest::{ClobClient, DataApiClient, GammaClient};
use crate::infrastructure::stream::{MarketStream, StreamHandle};

use super::reconciler::{ReconcilerSettings, StateReconciler};
use super::resolver::{MarketQuery, MarketResolver, ResolveError};

/// Resilient market-data ingestion engine.
///
/// Construct once, [`resolve`](Self::resolve) a market, [`watch`](Self::watch)
/// it, then read [`view`](Self::view) snapshots at whatever cadence the
/// presentation wants. [`shutdown`](Self::shutdown) stops every background
/// task and is idempotent.
pub struct MarketDataEngine {
    config: EngineConfig,
    limiter: Arc<RateLimiter>,
    gamma: Arc<GammaClient>,
    clob: Arc<ClobClient>,
    data: Arc<DataApiClient>,
    resolver: MarketResolver<GammaClient>,
    reconciler: Arc<RwLock<StateReconciler>>,
    cancel: CancellationToken,
    stream: Mutex<Option<StreamHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketDataEngine {
    /// Build an engine from configuration. Fails only if the HTTP client
    /// cannot be constructed.
    pub fn new(config: EngineConfig) -> Result<Self, FetchError> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.clone()));
        let http = Arc::new(RequestClient::new(Arc::clone(&limiter), config.http.clone())?);

        let gamma = Arc::new(GammaClient::new(
            Arc::clone(&http),
            config.endpoints.gamma_base.clone(),
        ));
        let clob = Arc::new(ClobClient::new(
            Arc::clone(&http),
            config.endpoints.clob_base.clone(),
        ));
        let data = Arc::new(DataApiClient::new(
            Arc::clone(&http),
            config.endpoints.data_api_base.clone(),
        ));

        let resolver = MarketResolver::new(gamma.as_ref().clone());
        let reconciler = Arc::new(RwLock::new(StateReconciler::new(
            ReconcilerSettings::from_staleness(&config.staleness),
        )));

        Ok(Self {
            config,
            limiter,
            gamma,
            clob,
            data,
            resolver,
            reconciler,
            cancel: CancellationToken::new(),
            stream: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// The rate limiter shared by every REST call this engine makes.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch a candidate list of active markets for resolution fallback.
    pub async fn discover(&self, limit: u32) -> Result<Vec<CanonicalMarket>, FetchError> {
        self.gamma.markets(limit).await
    }

    /// Resolve a query to a canonical market, falling back to `candidates`.
    pub async fn resolve(
        &self,
        query: &MarketQuery,
        candidates: &[CanonicalMarket],
    ) -> Result<CanonicalMarket, ResolveError> {
        self.resolver.resolve(query, candidates).await
    }

    /// Start ingesting a market: subscribe its tokens on the shared stream
    /// and spawn its REST poll loops.
    pub fn watch(&self, market: &CanonicalMarket) {
        self.reconciler.write().register_market(market);

        {
            let mut stream = self.stream.lock();
            if let Some(handle) = stream.as_ref() {
                handle.subscribe(market.token_ids.iter().cloned());
            } else {
                let (handle, event_rx) = MarketStream::spawn(
                    self.config.endpoints.stream_url.clone(),
                    self.config.stream.clone(),
                    market.token_ids.clone(),
                );
                self.tasks.lock().push(tokio::spawn(pump_events(
                    event_rx,
                    Arc::clone(&self.reconciler),
                    self.cancel.clone(),
                )));
                *stream = Some(handle);
            }
        }

        let Some(primary) = market.primary_token() else {
            return;
        };
        let condition_id = market.condition_id.clone();
        let token_id = primary.to_string();
        let refresh = &self.config.refresh;

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(book_poll(
            Arc::clone(&self.clob),
            Arc::clone(&self.reconciler),
            condition_id.clone(),
            token_id.clone(),
            refresh.book_interval,
            self.cancel.clone(),
        )));
        tasks.push(tokio::spawn(history_poll(
            Arc::clone(&self.clob),
            Arc::clone(&self.reconciler),
            condition_id.clone(),
            token_id,
            refresh.history_range.clone(),
            refresh.history_fidelity,
            refresh.history_interval,
            self.cancel.clone(),
        )));
        tasks.push(tokio::spawn(holders_poll(
            Arc::clone(&self.data),
            Arc::clone(&self.reconciler),
            condition_id,
            refresh.holders_limit,
            refresh.holders_interval,
            self.cancel.clone(),
        )));
    }

    /// Add assets to the live subscription (e.g. a sibling outcome).
    pub fn subscribe_assets(&self, ids: impl IntoIterator<Item = String>) {
        if let Some(handle) = self.stream.lock().as_ref() {
            handle.subscribe(ids);
        }
    }

    /// Remove assets from the live subscription.
    pub fn unsubscribe_assets(&self, ids: &[String]) {
        if let Some(handle) = self.stream.lock().as_ref() {
            handle.unsubscribe(ids);
        }
    }

    /// Current stream connection status, when a stream is running.
    pub fn stream_status(&self) -> Option<ConnectionStatus> {
        self.stream.lock().as_ref().map(StreamHandle::status)
    }

    /// Snapshot the reconciled view of one market.
    pub fn view(&self, condition_id: &str) -> Option<ReconciledView> {
        self.reconciler.read().view(condition_id)
    }

    /// Condition ids of every watched market.
    pub fn watched(&self) -> Vec<String> {
        self.reconciler.read().condition_ids()
    }

    /// Stop every background task. Idempotent; safe to call twice.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.stream.lock().take() {
            handle.close();
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}

async fn pump_events(
    mut events: mpsc::Receiver<StreamEvent>,
    reconciler: Arc<RwLock<StateReconciler>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    StreamEvent::Update(update) => {
                        reconciler.write().apply_stream_update(&update);
                    }
                    StreamEvent::Book(snapshot) => {
                        reconciler.write().apply_stream_book(&snapshot);
                    }
                    StreamEvent::Connected => {
                        tracing::info!("stream connected");
                    }
                    StreamEvent::Reconnecting { attempt } => {
                        tracing::info!(attempt, "stream reconnecting");
                    }
                    StreamEvent::Stale { silent_for } => {
                        tracing::warn!(
                            silent_ms = silent_for.as_millis() as u64,
                            "stream went stale"
                        );
                    }
                    StreamEvent::Error(message) => {
                        tracing::warn!(%message, "stream error");
                    }
                    StreamEvent::Closed => break,
                }
            }
        }
    }
}

async fn book_poll(
    clob: Arc<ClobClient>,
    reconciler: Arc<RwLock<StateReconciler>>,
    condition_id: String,
    token_id: String,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match clob.order_book(&token_id).await {
                    Ok(Some(book)) => {
                        reconciler.write().apply_rest_book(&condition_id, &token_id, book);
                    }
                    Ok(None) => {
                        tracing::debug!(%token_id, "venue returned no book");
                    }
                    Err(e) => {
                        tracing::warn!(%token_id, error = %e, "book poll failed");
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn history_poll(
    clob: Arc<ClobClient>,
    reconciler: Arc<RwLock<StateReconciler>>,
    condition_id: String,
    token_id: String,
    range: String,
    fidelity: u32,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match clob.price_history(&token_id, &range, fidelity).await {
                    Ok(points) if !points.is_empty() => {
                        reconciler.write().apply_history(&condition_id, points);
                    }
                    Ok(_) => {
                        tracing::debug!(%token_id, "empty history response");
                    }
                    Err(e) => {
                        tracing::warn!(%token_id, error = %e, "history poll failed");
                    }
                }
            }
        }
    }
}

async fn holders_poll(
    data: Arc<DataApiClient>,
    reconciler: Arc<RwLock<StateReconciler>>,
    condition_id: String,
    limit: u32,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match data.holders(&condition_id, limit).await {
                    Ok(holders) if !holders.is_empty() => {
                        reconciler.write().apply_holders(&condition_id, holders);
                    }
                    Ok(_) => {
                        tracing::debug!(%condition_id, "empty holders response");
                    }
                    Err(e) => {
                        tracing::warn!(%condition_id, error = %e, "holders poll failed");
                    }
                }
            }
        }
    }
}
