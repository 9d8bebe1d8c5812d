//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server runs.
    pub status: &'static str,
    /// Relay version.
    pub version: &'static str,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Open `WebSocket` connections.
    pub connections: usize,
    /// Sessions in the store.
    pub active_sessions: usize,
    /// Sessions with an answer in flight.
    pub streaming: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    sessions: usize,
    streaming: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        version: relay_core::constants::VERSION,
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_sessions: sessions,
        streaming,
    }
}
