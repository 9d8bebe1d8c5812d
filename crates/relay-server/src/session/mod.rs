//! Per-connection sessions.
//!
//! A [`Session`] holds the conversation history, the selected backend and
//! the idle-reminder timer for one open connection. Sessions live in the
//! [`SessionStore`] exactly as long as their connection is open.
//!
//! Locks guard plain data only and are never held across an `.await`.

mod idle_timer;
mod store;

pub use idle_timer::IdleTimerManager;
pub use store::SessionStore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use relay_core::{Backend, ConnectionId, Exchange, History};
use tokio::task::JoinHandle;

/// State for one live connection.
pub struct Session {
    connection_id: ConnectionId,
    backend: Mutex<Backend>,
    history: Mutex<History>,
    /// Pending reminder. Only [`IdleTimerManager`] touches this.
    idle_timer: Mutex<Option<JoinHandle<()>>>,
    streaming: AtomicBool,
    created_at: Instant,
}

impl Session {
    /// Fresh session: empty history, no timer, `backend` selected.
    pub fn new(connection_id: ConnectionId, backend: Backend) -> Self {
        Self {
            connection_id,
            backend: Mutex::new(backend),
            history: Mutex::new(History::new()),
            idle_timer: Mutex::new(None),
            streaming: AtomicBool::new(false),
            created_at: Instant::now(),
        }
    }

    /// Owning connection.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Currently selected backend.
    pub fn backend(&self) -> Backend {
        *self.backend.lock()
    }

    /// Select a backend for subsequent questions.
    pub fn set_backend(&self, backend: Backend) {
        *self.backend.lock() = backend;
    }

    /// Snapshot of the history.
    pub fn history(&self) -> History {
        self.history.lock().clone()
    }

    /// Number of completed exchanges.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Append a completed exchange.
    pub fn record(&self, exchange: Exchange) {
        self.history.lock().push(exchange);
    }

    /// Whether an answer is currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Mark the session as streaming until the guard drops.
    pub(crate) fn begin_stream(&self) -> StreamingGuard<'_> {
        self.streaming.store(true, Ordering::Release);
        StreamingGuard { session: self }
    }

    /// Whether a reminder is scheduled and has not fired yet.
    pub fn has_idle_timer(&self) -> bool {
        self.idle_timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Swap the pending timer, returning the previous one.
    pub(crate) fn replace_idle_timer(&self, handle: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        std::mem::replace(&mut *self.idle_timer.lock(), handle)
    }

    /// Session age.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Clears the streaming flag on drop, including when the stream future is
/// cancelled.
pub(crate) struct StreamingGuard<'a> {
    session: &'a Session,
}

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.session.streaming.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ConnectionId::from("c1"), Backend::default())
    }

    #[test]
    fn new_session_is_empty() {
        let s = session();
        assert_eq!(s.connection_id().as_str(), "c1");
        assert_eq!(s.backend(), Backend::UpstashGemma3Nomic);
        assert_eq!(s.history_len(), 0);
        assert!(!s.is_streaming());
        assert!(!s.has_idle_timer());
    }

    #[test]
    fn last_backend_wins() {
        let s = session();
        s.set_backend(Backend::SupabaseGemini);
        s.set_backend(Backend::UpstashGemma3Nomic);
        s.set_backend(Backend::SupabaseGemini);
        assert_eq!(s.backend(), Backend::SupabaseGemini);
    }

    #[test]
    fn record_appends_in_order() {
        let s = session();
        s.record(Exchange::new("q1", "a1"));
        s.record(Exchange::new("q2", "a2"));
        let history = s.history();
        let users: Vec<&str> = history.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, ["q1", "q2"]);
    }

    #[test]
    fn history_snapshot_is_detached() {
        let s = session();
        let before = s.history();
        s.record(Exchange::new("q", "a"));
        assert!(before.is_empty());
        assert_eq!(s.history_len(), 1);
    }

    #[test]
    fn streaming_guard_clears_flag() {
        let s = session();
        {
            let _guard = s.begin_stream();
            assert!(s.is_streaming());
        }
        assert!(!s.is_streaming());
    }

    #[test]
    fn age_counts_from_creation() {
        let s = session();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(s.age() >= std::time::Duration::from_millis(5));
    }
}
