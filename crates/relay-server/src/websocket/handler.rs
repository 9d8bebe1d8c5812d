//! Inbound frame handling: backend selection and questions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use relay_core::{Backend, OutboundFrame};
use relay_llm::BackendRegistry;
use relay_settings::{ConcurrentQuestionPolicy, RelaySettings, ServerSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use crate::session::{IdleTimerManager, SessionStore};
use crate::stream::{StreamCoordinator, StreamOutcome};

/// Everything a connection needs, shared by all connections.
pub struct RelayContext {
    /// Live sessions.
    pub sessions: Arc<SessionStore>,
    /// Answer streaming.
    pub coordinator: StreamCoordinator,
    /// Idle reminders.
    pub idle: IdleTimerManager,
    /// Questions arriving mid-answer.
    pub concurrent_questions: ConcurrentQuestionPolicy,
    /// Transport limits and heartbeat.
    pub transport: ServerSettings,
    /// Cancelled on server shutdown; closes every connection.
    pub shutdown: CancellationToken,
    connections: AtomicUsize,
}

impl RelayContext {
    /// Wire the session components from settings.
    pub fn new(
        settings: &RelaySettings,
        registry: Arc<BackendRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        let session = &settings.session;
        let max_duration = (session.max_stream_duration_ms > 0)
            .then(|| Duration::from_millis(session.max_stream_duration_ms));
        Self {
            sessions: Arc::new(SessionStore::new(session.default_backend)),
            coordinator: StreamCoordinator::new(registry)
                .with_partial_answers(session.partial_answers)
                .with_max_duration(max_duration),
            idle: IdleTimerManager::new(
                Duration::from_millis(session.idle_timeout_ms),
                session.reminder_message.as_str(),
            ),
            concurrent_questions: session.concurrent_questions,
            transport: settings.server.clone(),
            shutdown,
            connections: AtomicUsize::new(0),
        }
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub(crate) fn connection_opened(&self) {
        let _ = self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        let _ = self.connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Stream an answer to `question`, pausing the idle timer while it runs.
///
/// Questions for one connection must not overlap.
pub async fn answer_question(
    question: &str,
    connection: &Arc<ClientConnection>,
    ctx: &RelayContext,
) -> StreamOutcome {
    let session = ctx.sessions.get_or_create(&connection.id);
    let _ = ctx.idle.cancel(&session);
    debug!(chars = question.len(), history = session.history_len(), "question received");

    let outcome = ctx.coordinator.run(connection, question, &session).await;
    if connection.is_open() {
        ctx.idle.rearm(&session, connection.clone());
    }
    outcome
}

/// Apply a `config` frame. Takes effect for the next question that starts,
/// even while an answer is streaming.
pub async fn select_backend(id: &str, connection: &ClientConnection, ctx: &RelayContext) {
    let session = ctx.sessions.get_or_create(&connection.id);
    match id.parse::<Backend>() {
        Ok(backend) => {
            session.set_backend(backend);
            if !ctx.coordinator.registry().enabled(backend) {
                warn!(backend = %backend, "selected backend is disabled, default will answer");
            }
            info!(backend = %backend, "backend selected");
        }
        Err(e) => {
            warn!(error = %e, current = %session.backend(), "rejected config frame");
            let _ = connection
                .send_frame(&OutboundFrame::Error(format!(
                    "Unknown chatbot configuration: {id}"
                )))
                .await;
        }
    }
}
