//! # relay-server
//!
//! Axum HTTP + `WebSocket` chat relay.
//!
//! - [`session`]: per-connection sessions, the store, and idle reminders
//! - [`stream`]: drives one answer from producer to client frames
//! - [`websocket`]: connection state, frame dispatch, and the socket lifecycle
//! - [`server`]: router (`/api/ws`, `/health`, `/metrics`, `/api/chatbots/config`) and listener
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stream;
pub mod websocket;

pub use errors::ServerError;
pub use server::RelayServer;
pub use session::{IdleTimerManager, Session, SessionStore};
pub use stream::{StreamCoordinator, StreamOutcome};
