//! Connection → session map.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relay_core::{Backend, ConnectionId};
use tracing::debug;

use super::Session;

/// Process-wide session table, keyed by connection identity.
///
/// Constructed once at startup and shared by reference; there is no global.
/// Synchronous so teardown can run from a `Drop` impl.
pub struct SessionStore {
    sessions: RwLock<HashMap<ConnectionId, Arc<Session>>>,
    default_backend: Backend,
}

impl SessionStore {
    /// Empty store; new sessions start on `default_backend`.
    pub fn new(default_backend: Backend) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_backend,
        }
    }

    /// Session for `id`, created with defaults if absent.
    pub fn get_or_create(&self, id: &ConnectionId) -> Arc<Session> {
        if let Some(session) = self.sessions.read().get(id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write();
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(connection_id = %id, backend = %self.default_backend, "session created");
                Arc::new(Session::new(id.clone(), self.default_backend))
            })
            .clone()
    }

    /// Session for `id`, if one exists.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Delete the session for `id`. Idempotent.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            debug!(connection_id = %id, "session removed");
        }
        removed
    }

    /// Whether a session exists for `id`.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Number of sessions with an answer in flight.
    pub fn streaming_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_streaming())
            .count()
    }

    /// Backend assigned to new sessions.
    pub fn default_backend(&self) -> Backend {
        self.default_backend
    }
}
