//! WebSocket connection state, frame dispatch, and connection lifecycle.

pub mod connection;
pub mod handler;
pub mod session;

pub use connection::ClientConnection;
pub use handler::{RelayContext, answer_question, select_backend};
pub use session::run_ws_session;
