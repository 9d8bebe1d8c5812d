//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::{ConnectionId, OutboundFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One accepted socket, as seen by everything above the transport.
///
/// Frames go through a bounded channel to the socket's write task. Closing
/// is one-way: once [`close`](Self::close) runs, every send fails and every
/// [`closed`](Self::closed) waiter wakes.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was accepted.
    pub connected_at: Instant,
    /// Whether the client has shown activity since the last heartbeat check.
    is_alive: AtomicBool,
    /// When the last Pong (or any inbound frame) was seen.
    last_activity: Mutex<Instant>,
    /// Frames enqueued for the client.
    sent_frames: AtomicU64,
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a new open connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_activity: Mutex::new(now),
            sent_frames: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Mark the connection closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Enqueue a frame for the client.
    ///
    /// Waits for queue capacity, so frames are never silently dropped while
    /// the connection is open. Returns `false` if the connection closed
    /// first; a frame is never enqueued after close.
    pub async fn send_frame(&self, frame: &OutboundFrame) -> bool {
        if !self.is_open() {
            return false;
        }
        let json = match frame.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "failed to encode frame");
                return false;
            }
        };
        let sent = tokio::select! {
            biased;
            () = self.closed.cancelled() => false,
            result = self.tx.send(json) => result.is_ok(),
        };
        if sent {
            let _ = self.sent_frames.fetch_add(1, Ordering::Relaxed);
        } else {
            self.close();
        }
        sent
    }

    /// Total frames enqueued for this connection.
    pub fn sent_count(&self) -> u64 {
        self.sent_frames.load(Ordering::Relaxed)
    }

    /// Record client activity (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_activity.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the client was active since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last client activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::new(ConnectionId::from("conn_1"), tx);
        (conn, rx)
    }

    #[test]
    fn new_connection_is_open() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.id.as_str(), "conn_1");
        assert!(conn.is_open());
        assert_eq!(conn.sent_count(), 0);
    }

    #[tokio::test]
    async fn send_frame_encodes_json() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send_frame(&OutboundFrame::Chunk("Hi".into())).await);
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "chunk");
        assert_eq!(parsed["content"], "Hi");
        assert_eq!(conn.sent_count(), 1);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (conn, mut rx) = make_connection(4);
        conn.close();
        assert!(!conn.send_frame(&OutboundFrame::End("x".into())).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_dropped_receiver_closes() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send_frame(&OutboundFrame::System("x".into())).await);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn full_queue_waits_for_capacity() {
        let (conn, mut rx) = make_connection(1);
        let conn = Arc::new(conn);
        assert!(conn.send_frame(&OutboundFrame::Chunk("1".into())).await);

        let sender = conn.clone();
        let pending =
            tokio::spawn(async move { sender.send_frame(&OutboundFrame::Chunk("2".into())).await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        let _ = rx.recv().await.unwrap();
        assert!(pending.await.unwrap());
        let second = rx.recv().await.unwrap();
        assert!(second.contains("\"2\""));
    }

    #[tokio::test]
    async fn close_unblocks_waiting_sender() {
        let (conn, _rx) = make_connection(1);
        let conn = Arc::new(conn);
        assert!(conn.send_frame(&OutboundFrame::Chunk("1".into())).await);

        let sender = conn.clone();
        let pending =
            tokio::spawn(async move { sender.send_frame(&OutboundFrame::Chunk("2".into())).await });
        tokio::task::yield_now().await;
        conn.close();
        assert!(!pending.await.unwrap());
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let (conn, _rx) = make_connection(1);
        let conn = Arc::new(conn);
        let waiter = conn.clone();
        let handle = tokio::spawn(async move { waiter.closed().await });
        conn.close();
        conn.close();
        handle.await.unwrap();
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn idle_for_resets_on_activity() {
        let (conn, _rx) = make_connection(1);
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.idle_for() >= Duration::from_millis(10));
        conn.mark_alive();
        assert!(conn.idle_for() < Duration::from_millis(10));
        assert!(conn.age() >= Duration::from_millis(10));
    }
}
