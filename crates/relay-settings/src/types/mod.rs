//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields get their default value.

mod backends;
mod server;
mod session;

pub use backends::*;
pub use server::*;
pub use session::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "session": { "idleTimeoutMs": 60000, "partialAnswers": "keep" },
///   "backends": { "upstashGemma3Nomic": { "model": "gemma3:4b" } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and transport settings.
    pub server: ServerSettings,
    /// Per-connection session behavior.
    pub session: SessionSettings,
    /// Answer backend endpoints.
    pub backends: BackendsSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.ws_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.wsPath must start with '/': {}",
                self.server.ws_path
            )));
        }
        if self.server.outbound_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.outboundQueue must be at least 1".into(),
            ));
        }
        if self.session.idle_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.idleTimeoutMs must be positive".into(),
            ));
        }
        for (name, llm) in self.backends.iter() {
            if llm.base_url.is_empty() || llm.model.is_empty() {
                return Err(SettingsError::InvalidValue(format!(
                    "backend {name} needs both baseUrl and model"
                )));
            }
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
