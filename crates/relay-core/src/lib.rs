//! # relay-core
//!
//! Shared vocabulary for the chat relay crates:
//!
//! - **Connection IDs**: `ConnectionId` newtype, one per physical connection
//! - **Frames**: `InboundFrame` / `OutboundFrame` and the JSON wire encoding
//! - **Backends**: closed `Backend` enum of retrieval + LLM combinations
//! - **History**: append-only `History` of completed `Exchange`s
//! - **Errors**: `RelayError` and `FrameError` via `thiserror`
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod backend;
pub mod constants;
pub mod errors;
pub mod frames;
pub mod history;
pub mod ids;
pub mod logging;

pub use backend::Backend;
pub use errors::{FrameError, RelayError, Result};
pub use frames::{InboundFrame, OutboundFrame, parse_inbound};
pub use history::{Exchange, History};
pub use ids::ConnectionId;
