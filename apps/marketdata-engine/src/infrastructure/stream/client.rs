//! Market data WebSocket client.
//!
//! Manages one connection's lifecycle: subscribe on open, staleness
//! watchdog, automatic reconnection with exponential backoff and jitter,
//! incremental subscription changes. Everything the client observes is
//! reported to the consumer as [`StreamEvent`]s on an `mpsc` channel —
//! transport failures never surface as errors, so a long-lived consumer
//! cannot be crashed by a flaky upstream.
//!
//! The staleness watchdog is separate from transport state on purpose: a
//! dead peer may never send a TCP-level close, so "open" does not imply
//! alive.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{ConnectionStatus, StreamEvent};
use crate::infrastructure::config::StreamSettings;

use super::messages::{self, InboundMessage, OperationAction};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};

/// Capacity of the consumer event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
}

enum ConnectionOutcome {
    /// The caller closed the client; terminal.
    CallerClosed,
    /// The connection was lost; a reconnect should be scheduled.
    Lost,
}

/// Factory for market data stream connections.
pub struct MarketStream;

impl MarketStream {
    /// Spawn a streaming client subscribed to `assets`.
    ///
    /// Returns the control handle and the event channel. The background
    /// task runs until [`StreamHandle::close`] is called; the final event
    /// on the channel is always [`StreamEvent::Closed`].
    pub fn spawn(
        url: String,
        settings: StreamSettings,
        assets: Vec<String>,
    ) -> (StreamHandle, mpsc::Receiver<StreamEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = StreamHandle {
            id: Uuid::new_v4(),
            assets: Arc::new(RwLock::new(assets.into_iter().collect())),
            status: Arc::new(RwLock::new(ConnectionStatus::Connecting)),
            cmd_tx,
            cancel: cancel.clone(),
        };

        let worker = StreamWorker {
            id: handle.id,
            url,
            settings,
            assets: Arc::clone(&handle.assets),
            status: Arc::clone(&handle.status),
            cancel,
            event_tx,
            cmd_rx,
        };
        tokio::spawn(worker.run());

        (handle, event_rx)
    }
}

/// Control handle for a spawned streaming client.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Uuid,
    assets: Arc<RwLock<BTreeSet<String>>>,
    status: Arc<RwLock<ConnectionStatus>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Identifier of this subscription, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// The full current asset set.
    pub fn assets(&self) -> Vec<String> {
        self.assets.read().iter().cloned().collect()
    }

    /// Add assets to the subscription.
    ///
    /// On a live connection an incremental frame is sent; while
    /// disconnected this only records the change — the next reconnect
    /// re-subscribes the full current set, so nothing is lost long-term.
    pub fn subscribe(&self, ids: impl IntoIterator<Item = String>) {
        let fresh: Vec<String> = {
            let mut set = self.assets.write();
            ids.into_iter().filter(|id| set.insert(id.clone())).collect()
        };
        if !fresh.is_empty() {
            let _ = self.cmd_tx.send(Command::Subscribe(fresh));
        }
    }

    /// Remove assets from the subscription. Same liveness semantics as
    /// [`Self::subscribe`].
    pub fn unsubscribe(&self, ids: &[String]) {
        let removed: Vec<String> = {
            let mut set = self.assets.write();
            ids.iter().filter(|id| set.remove(*id)).cloned().collect()
        };
        if !removed.is_empty() {
            let _ = self.cmd_tx.send(Command::Unsubscribe(removed));
        }
    }

    /// Terminal close: stops the reconnect scheduler and any in-flight
    /// connect attempt. No further events fire after the final `Closed`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

struct StreamWorker {
    id: Uuid,
    url: String,
    settings: StreamSettings,
    assets: Arc<RwLock<BTreeSet<String>>>,
    status: Arc<RwLock<ConnectionStatus>>,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<StreamEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl StreamWorker {
    async fn run(mut self) {
        let mut policy =
            ReconnectPolicy::new(ReconnectConfig::from_stream_settings(&self.settings));

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.set_status(ConnectionStatus::Connecting);

            match self.connect_and_run(&mut policy).await {
                ConnectionOutcome::CallerClosed => break,
                ConnectionOutcome::Lost => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let delay = policy.next_delay();
                    let attempt = policy.attempt();
                    tracing::info!(
                        stream = %self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "reconnect scheduled"
                    );
                    self.emit(StreamEvent::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.set_status(ConnectionStatus::Closed);
        let _ = self.event_tx.send(StreamEvent::Closed).await;
        tracing::info!(stream = %self.id, "market stream closed");
    }

    async fn connect_and_run(&mut self, policy: &mut ReconnectPolicy) -> ConnectionOutcome {
        // Commands queued while disconnected are covered by the full
        // re-subscribe below; drop them.
        while self.cmd_rx.try_recv().is_ok() {}

        let ws = tokio::select! {
            () = self.cancel.cancelled() => return ConnectionOutcome::CallerClosed,
            result = connect_async(&self.url) => match result {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    self.set_status(ConnectionStatus::Error);
                    self.emit(StreamEvent::Error(format!("connect failed: {e}"))).await;
                    return ConnectionOutcome::Lost;
                }
            }
        };

        let (mut write, mut read) = ws.split();

        let assets = {
            let set = self.assets.read();
            set.iter().cloned().collect::<Vec<_>>()
        };
        let frame = messages::subscribe_frame(&assets);
        if let Err(e) = write.send(Message::Text(frame.into())).await {
            self.set_status(ConnectionStatus::Error);
            self.emit(StreamEvent::Error(format!("subscribe send failed: {e}")))
                .await;
            return ConnectionOutcome::Lost;
        }

        policy.reset();
        self.set_status(ConnectionStatus::Connected);
        self.emit(StreamEvent::Connected).await;
        tracing::info!(stream = %self.id, assets = assets.len(), "market stream connected");

        let mut last_message_at = Instant::now();
        let mut watchdog = tokio::time::interval(self.settings.watchdog_tick);
        watchdog.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return ConnectionOutcome::CallerClosed;
                }
                command = self.cmd_rx.recv() => {
                    let Some(command) = command else { continue };
                    if let Err(e) = Self::send_operation(&mut write, command).await {
                        self.set_status(ConnectionStatus::Error);
                        self.emit(StreamEvent::Error(e)).await;
                        return ConnectionOutcome::Lost;
                    }
                }
                _ = watchdog.tick() => {
                    let silent_for = last_message_at.elapsed();
                    if silent_for > self.settings.stale_after {
                        tracing::warn!(
                            stream = %self.id,
                            silent_ms = silent_for.as_millis() as u64,
                            "no frames within staleness threshold, force-closing"
                        );
                        self.set_status(ConnectionStatus::Stale);
                        self.emit(StreamEvent::Stale { silent_for }).await;
                        let _ = write.send(Message::Close(None)).await;
                        return ConnectionOutcome::Lost;
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            last_message_at = Instant::now();
                            if self.handle_text(text.as_str(), &mut write).await.is_err() {
                                return ConnectionOutcome::Lost;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            last_message_at = Instant::now();
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_message_at = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(stream = %self.id, "server sent close frame");
                            self.set_status(ConnectionStatus::Error);
                            self.emit(StreamEvent::Error("closed by server".to_string())).await;
                            return ConnectionOutcome::Lost;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.set_status(ConnectionStatus::Error);
                            self.emit(StreamEvent::Error(format!("transport error: {e}"))).await;
                            return ConnectionOutcome::Lost;
                        }
                        None => {
                            self.set_status(ConnectionStatus::Error);
                            self.emit(StreamEvent::Error("stream ended".to_string())).await;
                            return ConnectionOutcome::Lost;
                        }
                    }
                }
            }
        }
    }

    /// Handle one text frame. `Err` means the write half failed and the
    /// connection should be torn down; parse failures are reported and
    /// tolerated.
    async fn handle_text<W>(&self, text: &str, write: &mut W) -> Result<(), ()>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let parsed = match messages::decode_frame(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(stream = %self.id, error = %e, "undecodable frame");
                self.emit(StreamEvent::Error(format!("frame parse failed: {e}")))
                    .await;
                return Ok(());
            }
        };

        for message in parsed {
            match message {
                InboundMessage::Heartbeat { id } => {
                    let reply = messages::heartbeat_reply(id.as_deref());
                    if let Err(e) = write.send(Message::Text(reply.into())).await {
                        self.emit(StreamEvent::Error(format!("heartbeat reply failed: {e}")))
                            .await;
                        return Err(());
                    }
                }
                InboundMessage::Update(update) => {
                    self.emit(StreamEvent::Update(update)).await;
                }
                InboundMessage::Book(snapshot) => {
                    self.emit(StreamEvent::Book(snapshot)).await;
                }
                InboundMessage::Ignored => {}
            }
        }
        Ok(())
    }

    async fn send_operation<W>(write: &mut W, command: Command) -> Result<(), String>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let frame = match command {
            Command::Subscribe(ids) => messages::operation_frame(OperationAction::Subscribe, &ids),
            Command::Unsubscribe(ids) => {
                messages::operation_frame(OperationAction::Unsubscribe, &ids)
            }
        };
        write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| format!("subscription frame send failed: {e}"))
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    async fn emit(&self, event: StreamEvent) {
        if self.event_tx.send(event).await.is_err() {
            // Consumer dropped the channel; shut the worker down.
            self.cancel.cancel();
        }
    }
}
