//! Realtime module: the marketplace's WebSocket connection manager.
//!
//! This module provides:
//! - A single-endpoint connection with auto-reconnect and a bounded attempt
//!   budget (fixed delay between attempts)
//! - A clonable send handle that only transmits while connected
//! - A typed event stream the consumer subscribes to exactly once
//!
//! # Architecture
//!
//! ```text
//!   caller (page composition)
//!        │ connect()/disconnect()/send()
//!        ▼
//!   ┌──────────────┐   commands    ┌─────────────────────┐
//!   │ WsConnection │──────────────▶│   connection actor   │
//!   │  (owner API) │   outbound    │  (single tokio task) │
//!   └──────────────┘──────────────▶│  state machine +     │
//!        │  ▲                      │  reconnect schedule  │
//!        │  │ watch<ConnectionState>└────────┬────────────┘
//!        │  └────────────────────────────────┤
//!        │            WsEvent channel        ▼
//!        └──────────────────────────▶ consumer store/reducer
//! ```
//!
//! The actor exclusively owns the underlying socket. Consumers never touch
//! socket plumbing: they read [`ConnectionState`] from the watch channel and
//! drain [`WsEvent`]s from the receiver returned by [`WsConnection::events`].
//!
//! Identity changes (a different signed-in user) are the caller's concern:
//! disconnect and drop the old `WsConnection`, then construct a new one with
//! a URL for the new identity.

mod config;
mod connection;
mod state;
mod transport;

pub use config::ConnectionConfig;
pub use connection::{ConnectionError, InboundMessage, WsConnection, WsEvent, WsHandle};
pub use state::{ConnectionState, ConnectionStatus, CLOSE_NORMAL, CLOSE_POLICY};
pub use transport::{Frame, Socket, Transport, TransportError, TungsteniteTransport};
