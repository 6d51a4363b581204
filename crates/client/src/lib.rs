//! Tradeline client core.
//!
//! This crate contains the client-side foundation of the tradeline B2B
//! marketplace: realtime connection management with auto-reconnect, and
//! session-driven route authorization. Rendering lives elsewhere; page
//! composition consumes these components through their channels and
//! decision values.

pub mod api_client;
pub mod auth;
pub mod logging;
pub mod ws;

pub use api_client::ApiClient;
pub use auth::{
    AccessRequirement, AuthSession, BlockingView, GateDecision, Navigator, Redirect, RouteGuard,
};
pub use ws::{ConnectionConfig, ConnectionState, ConnectionStatus, WsConnection, WsEvent, WsHandle};
