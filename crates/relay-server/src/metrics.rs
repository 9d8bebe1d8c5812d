//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before anything is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Inbound frames dropped as malformed (counter, labels: reason).
pub const FRAMES_REJECTED_TOTAL: &str = "frames_rejected_total";
/// Questions turned away while busy (counter).
pub const QUESTIONS_REJECTED_TOTAL: &str = "questions_rejected_total";
/// Answers finished (counter, labels: backend, outcome).
pub const ANSWERS_TOTAL: &str = "answers_total";
/// Answer duration seconds (histogram, labels: backend).
pub const ANSWER_DURATION_SECONDS: &str = "answer_duration_seconds";
/// Producer failures (counter, labels: backend, category).
pub const PRODUCER_ERRORS_TOTAL: &str = "producer_errors_total";
/// Idle reminders delivered (counter).
pub const IDLE_REMINDERS_TOTAL: &str = "idle_reminders_total";
