//! # Answer Producer
//!
//! Core abstraction between the relay and whatever generates answers. A
//! producer takes a question plus the session's history and returns a lazy,
//! ordered, finite stream of text fragments. Stream end is the
//! end-of-answer signal; an `Err` item is a mid-stream failure.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use relay_core::Exchange;

/// Result type alias for producer operations.
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Boxed stream of answer fragments returned by [`AnswerProducer::answer`].
pub type FragmentStream = Pin<Box<dyn Stream<Item = ProducerResult<String>> + Send>>;

/// Errors that can occur while producing an answer.
///
/// These never reach the client verbatim; the relay replaces them with a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Upstream reported an error inside the event stream.
    #[error("stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// Retrieval of context documents failed.
    #[error("retrieval error: {message}")]
    Retrieval {
        /// Error description.
        message: String,
    },

    /// Producer-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProducerError {
    /// Error category string for logs and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Api { status, .. } if *status == 401 || *status == 403 => "auth",
            Self::Api { status: 429, .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Stream { .. } => "stream",
            Self::Retrieval { .. } => "retrieval",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Produces streamed answers.
///
/// Implementors must be `Send + Sync`: one instance serves every session
/// bound to its backend and is never mutated per request.
#[async_trait]
pub trait AnswerProducer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start answering `question` in the context of `history`.
    ///
    /// Failures before the first fragment are returned directly; later
    /// failures arrive as an `Err` item in the stream.
    async fn answer(&self, question: &str, history: &[Exchange]) -> ProducerResult<FragmentStream>;
}
