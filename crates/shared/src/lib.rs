//! Shared types and utilities for the tradeline server and client.

pub mod error;
pub mod models;
pub mod realtime;

pub use error::*;
pub use models::*;
pub use realtime::*;
