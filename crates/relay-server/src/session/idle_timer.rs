//! Idle reminders.
//!
//! After each exchange a one-shot timer is armed; if the client stays quiet
//! for the configured duration it receives a single `system` frame. Arming
//! aborts whatever timer was pending, so at most one is ever live per
//! session. Timers never re-arm themselves.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use relay_core::OutboundFrame;
use tracing::debug;

use super::Session;
use crate::metrics::IDLE_REMINDERS_TOTAL;
use crate::websocket::connection::ClientConnection;

/// Arms and cancels per-session idle timers.
#[derive(Clone, Debug)]
pub struct IdleTimerManager {
    duration: Duration,
    reminder: Arc<str>,
}

impl IdleTimerManager {
    /// Manager sending `reminder` after `duration` of silence.
    pub fn new(duration: Duration, reminder: impl Into<Arc<str>>) -> Self {
        Self {
            duration,
            reminder: reminder.into(),
        }
    }

    /// Idle duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Cancel any pending timer on `session` and start a new one.
    ///
    /// If `connection` has closed by the time it fires, nothing is sent.
    pub fn rearm(&self, session: &Session, connection: Arc<ClientConnection>) {
        let duration = self.duration;
        let reminder = self.reminder.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = connection.closed() => return,
                () = tokio::time::sleep(duration) => {}
            }
            if connection
                .send_frame(&OutboundFrame::System(reminder.to_string()))
                .await
            {
                counter!(IDLE_REMINDERS_TOTAL).increment(1);
                debug!(connection_id = %connection.id, "idle reminder sent");
            }
        });
        if let Some(previous) = session.replace_idle_timer(Some(handle)) {
            previous.abort();
        }
        debug!(connection_id = %session.connection_id(), after = ?duration, "idle timer armed");
    }

    /// Cancel the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&self, session: &Session) -> bool {
        match session.replace_idle_timer(None) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Backend, ConnectionId};
    use tokio::sync::mpsc;

    const IDLE: Duration = Duration::from_secs(600);

    fn setup() -> (
        IdleTimerManager,
        Session,
        Arc<ClientConnection>,
        mpsc::Receiver<Arc<String>>,
    ) {
        let (tx, rx) = mpsc::channel(8);
        let conn = Arc::new(ClientConnection::new(ConnectionId::from("c1"), tx));
        let session = Session::new(conn.id.clone(), Backend::default());
        let manager = IdleTimerManager::new(IDLE, "Hey, are you still here?");
        (manager, session, conn, rx)
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let (manager, session, conn, mut rx) = setup();
        manager.rearm(&session, conn);
        assert!(session.has_idle_timer());

        tokio::time::sleep(IDLE - Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        let msg = rx.try_recv().unwrap();
        let frame: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"type": "system", "content": "Hey, are you still here?"})
        );

        tokio::time::sleep(IDLE * 3).await;
        settle().await;
        assert!(rx.try_recv().is_err(), "timer must not re-arm itself");
        assert!(!session.has_idle_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_supersedes_previous_timer() {
        let (manager, session, conn, mut rx) = setup();
        manager.rearm(&session, conn.clone());
        tokio::time::sleep(IDLE / 2).await;
        manager.rearm(&session, conn);

        // The first timer's deadline passes without a reminder.
        tokio::time::sleep(IDLE / 2 + Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(IDLE / 2).await;
        settle().await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_reminder() {
        let (manager, session, conn, mut rx) = setup();
        manager.rearm(&session, conn);
        assert!(manager.cancel(&session));
        assert!(!manager.cancel(&session));

        tokio::time::sleep(IDLE * 2).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn firing_after_close_is_noop() {
        let (manager, session, conn, mut rx) = setup();
        manager.rearm(&session, conn.clone());
        conn.close();

        tokio::time::sleep(IDLE * 2).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(!session.has_idle_timer());
    }

    #[test]
    fn cancel_without_timer() {
        let (manager, session, _conn, _rx) = setup();
        assert!(!manager.cancel(&session));
        assert_eq!(manager.duration(), IDLE);
    }
}
