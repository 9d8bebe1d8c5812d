//! Error hierarchy shared by the relay crates.
//!
//! - [`FrameError`]: an inbound frame could not be interpreted. These are
//!   logged and dropped; they never close the connection.
//! - [`RelayError`]: configuration-level failures (unknown backend ids,
//!   serialization of outbound frames).

use thiserror::Error;

/// Why an inbound frame was not dispatched.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame carried a `type` tag this relay does not understand.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    /// A required field was absent or had the wrong JSON type.
    #[error("frame is missing field `{0}`")]
    MissingField(&'static str),

    /// Valid JSON, but not a shape the protocol defines (an array).
    #[error("unsupported frame payload")]
    Unsupported,

    /// A binary frame that is not UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidEncoding,
}

/// Top-level relay error.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A backend identifier outside the closed set.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// Inbound frame rejected.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for relay-core operations.
pub type Result<T> = std::result::Result<T, RelayError>;
