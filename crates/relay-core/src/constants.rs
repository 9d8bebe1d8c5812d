//! Package-level constants.

/// Current version of the relay (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "relay";

/// Message sent in an `error` frame when answering fails. Never carries
/// upstream error detail.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";

/// Default idle keep-alive prompt.
pub const DEFAULT_REMINDER: &str = "Hey, are you still here?";

/// Sent when a question arrives while the previous answer is still streaming
/// and the relay is configured to reject rather than queue.
pub const BUSY_MESSAGE: &str = "Still answering your previous question. Please wait.";

/// Sent when an answer stream exceeds the configured maximum duration.
pub const TIMEOUT_MESSAGE: &str =
    "Sorry, generating the answer took too long. Please try again.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
    }

    #[test]
    fn name_is_lowercase() {
        assert_eq!(NAME, NAME.to_lowercase());
    }
}
