//! Server error types.

use thiserror::Error;

/// Errors raised while starting or running the relay server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ServerError::from(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        assert_eq!(err.to_string(), "server I/O error: address in use");
    }

    #[test]
    fn metrics_error_display() {
        let err = ServerError::Metrics("already installed".into());
        assert!(err.to_string().contains("already installed"));
    }
}
