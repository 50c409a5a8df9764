//! Self-healing WebSocket client for the market data stream.

pub mod client;
pub mod messages;
pub mod reconnect;

pub use client::{MarketStream, StreamHandle};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
