//! Wire frames for the market data WebSocket.
//!
//! The upstream sends JSON frames either as a single object or as an array
//! of objects, with an `event_type` discriminator. Payload fields reuse the
//! normalizer's alias/coercion helpers because the stream exhibits the same
//! spelling drift as the REST APIs (`asset_id` vs `assetId` vs `token_id`).

use std::time::Instant;

use serde_json::{Value, json};

use crate::domain::{BookSnapshot, StreamUpdate, UpdateKind};
use crate::infrastructure::normalize::{alias, coerce_decimal, coerce_string, normalize_book};

/// A decoded inbound frame.
#[derive(Debug)]
pub enum InboundMessage {
    /// Server heartbeat; must be echoed back with the same id.
    Heartbeat {
        /// Heartbeat id to echo, when the server sent one.
        id: Option<String>,
    },
    /// A live delta.
    Update(StreamUpdate),
    /// A full book snapshot.
    Book(BookSnapshot),
    /// A frame we recognise as well-formed but do not consume.
    Ignored,
}

/// Initial subscribe frame listing every asset of interest.
pub fn subscribe_frame(assets: &[String]) -> String {
    json!({
        "type": "market",
        "assets_ids": assets,
        "custom_feature_enabled": true,
    })
    .to_string()
}

/// Incremental subscribe/unsubscribe on a live connection.
pub fn operation_frame(action: OperationAction, assets: &[String]) -> String {
    json!({
        "action": action.as_str(),
        "assets_ids": assets,
    })
    .to_string()
}

/// Echo for a server heartbeat, carrying the same id.
pub fn heartbeat_reply(id: Option<&str>) -> String {
    match id {
        Some(id) => json!({"type": "heartbeat", "id": id}).to_string(),
        None => json!({"type": "heartbeat"}).to_string(),
    }
}

/// Incremental subscription operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationAction {
    /// Add assets to the live subscription.
    Subscribe,
    /// Remove assets from the live subscription.
    Unsubscribe,
}

impl OperationAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Decode one text frame into zero or more messages.
///
/// The literal `PONG` keepalive decodes to nothing. Malformed JSON is an
/// error for the caller to report; it must not close the connection.
pub fn decode_frame(text: &str) -> Result<Vec<InboundMessage>, serde_json::Error> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("pong") || trimmed.eq_ignore_ascii_case("ping") {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let mut out = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                decode_object(&item, &mut out);
            }
        }
        other => decode_object(&other, &mut out),
    }
    Ok(out)
}

fn decode_object(value: &Value, out: &mut Vec<InboundMessage>) {
    let Some(event_type) = alias(value, &["event_type", "type"]).and_then(coerce_string) else {
        return;
    };

    // Some frames nest the payload under `data`, some are flat.
    let payload = value.get("data").filter(|d| d.is_object()).unwrap_or(value);

    match event_type.as_str() {
        "book" => {
            if let Some(msg) = decode_book(payload) {
                out.push(msg);
            }
        }
        "price_change" => {
            // Newer frames batch several level changes under `changes`.
            if let Some(changes) = payload.get("changes").and_then(Value::as_array) {
                for change in changes {
                    if let Some(msg) = decode_update(change, UpdateKind::PriceChange) {
                        out.push(msg);
                    }
                }
            } else if let Some(msg) = decode_update(payload, UpdateKind::PriceChange) {
                out.push(msg);
            }
        }
        "last_trade_price" => {
            if let Some(msg) = decode_update(payload, UpdateKind::LastTradePrice) {
                out.push(msg);
            }
        }
        "best_bid_ask" => {
            if let Some(msg) = decode_update(payload, UpdateKind::BestBidAsk) {
                out.push(msg);
            }
        }
        "heartbeat" | "ping" => {
            out.push(InboundMessage::Heartbeat {
                id: alias(value, &["id", "ts"]).and_then(coerce_string),
            });
        }
        other => {
            tracing::trace!(event_type = other, "ignoring unhandled stream event");
            out.push(InboundMessage::Ignored);
        }
    }
}

fn asset_id_of(payload: &Value) -> Option<String> {
    alias(payload, &["asset_id", "assetId", "token_id", "tokenId"]).and_then(coerce_string)
}

fn decode_book(payload: &Value) -> Option<InboundMessage> {
    let asset_id = asset_id_of(payload)?;
    let book = normalize_book(payload)?;
    Some(InboundMessage::Book(BookSnapshot {
        asset_id,
        book,
        received_at: Instant::now(),
    }))
}

fn decode_update(payload: &Value, kind: UpdateKind) -> Option<InboundMessage> {
    let asset_id = asset_id_of(payload)?;
    let best_bid = alias(payload, &["best_bid", "bestBid"]).and_then(coerce_decimal);
    let best_ask = alias(payload, &["best_ask", "bestAsk"]).and_then(coerce_decimal);
    let price = alias(payload, &["price", "p"]).and_then(coerce_decimal);

    let last_trade = match kind {
        UpdateKind::LastTradePrice => price,
        UpdateKind::BestBidAsk | UpdateKind::PriceChange => None,
    };

    Some(InboundMessage::Update(StreamUpdate {
        asset_id,
        kind,
        best_bid,
        best_ask,
        last_trade,
        received_at: Instant::now(),
    }))
}
