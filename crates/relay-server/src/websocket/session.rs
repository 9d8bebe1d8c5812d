//! WebSocket connection lifecycle: one accepted socket from upgrade through
//! disconnect.
//!
//! Three cooperating parts per connection:
//!
//! - **writer** task: drains the outbound queue into the socket and sends
//!   heartbeat Pings
//! - **reader** task: parses inbound frames, applies `config` frames at
//!   once and queues questions; with the `reject` policy it answers
//!   mid-stream questions itself
//! - **dispatcher** (this future): answers queued questions one at a time
//!
//! Whichever part notices the end first closes the [`ClientConnection`]; the
//! others observe it and stop. Teardown runs from a drop guard so it happens
//! exactly once on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::constants::BUSY_MESSAGE;
use relay_core::frames::parse_inbound_bytes;
use relay_core::{ConnectionId, FrameError, InboundFrame, OutboundFrame, parse_inbound};
use relay_settings::ConcurrentQuestionPolicy;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use super::connection::ClientConnection;
use super::handler::{RelayContext, answer_question, select_backend};
use crate::metrics::{
    FRAMES_REJECTED_TOTAL, QUESTIONS_REJECTED_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// Run the relay protocol on an upgraded socket until it closes.
pub async fn run_ws_session(ws: WebSocket, ctx: Arc<RelayContext>) {
    let id = ConnectionId::new();
    let span = info_span!("ws_session", connection_id = %id);
    serve_connection(ws, id, ctx).instrument(span).await;
}

async fn serve_connection(ws: WebSocket, id: ConnectionId, ctx: Arc<RelayContext>) {
    let (ws_tx, ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Arc<String>>(ctx.transport.outbound_queue);
    let connection = Arc::new(ClientConnection::new(id, send_tx));
    let _teardown = Teardown {
        ctx: ctx.clone(),
        connection: connection.clone(),
    };

    ctx.connection_opened();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer = tokio::spawn(
        write_frames(
            ws_tx,
            send_rx,
            connection.clone(),
            Duration::from_millis(ctx.transport.heartbeat_interval_ms),
            Duration::from_millis(ctx.transport.heartbeat_timeout_ms),
        )
        .in_current_span(),
    );

    // Set while a question is queued or being answered.
    let busy = Arc::new(AtomicBool::new(false));
    let (question_tx, mut question_rx) = mpsc::channel::<String>(ctx.transport.inbound_queue.max(1));
    let reader = tokio::spawn(
        read_frames(ws_rx, connection.clone(), question_tx, busy.clone(), ctx.clone())
            .in_current_span(),
    );

    loop {
        let question = tokio::select! {
            biased;
            () = connection.closed() => break,
            question = question_rx.recv() => match question {
                Some(question) => question,
                None => break,
            },
        };
        let outcome = answer_question(&question, &connection, &ctx).await;
        busy.store(false, Ordering::Release);
        debug!(outcome = outcome.label(), "question handled");
    }

    connection.close();
    reader.abort();
    // The writer exits on close and sends the Close frame itself.
    let _ = writer.await;
}

/// Forward queued frames to the socket and keep the connection alive.
async fn write_frames(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<String>>,
    connection: Arc<ClientConnection>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval.max(Duration::from_millis(1)));
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            biased;
            () = connection.closed() => break,
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                    debug!("socket write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if !connection.check_alive() && connection.idle_for() > pong_timeout {
                    warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    connection.close();
    let _ = ws_tx.send(Message::Close(None)).await;
}

/// Parse inbound messages, apply backend selections and queue questions for
/// the dispatcher.
///
/// Never blocks on the dispatcher, so a Close frame is seen even while an
/// answer is streaming.
async fn read_frames(
    mut ws_rx: SplitStream<WebSocket>,
    connection: Arc<ClientConnection>,
    question_tx: mpsc::Sender<String>,
    busy: Arc<AtomicBool>,
    ctx: Arc<RelayContext>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            () = connection.closed() => break,
            () = ctx.shutdown.cancelled() => {
                info!("server shutting down, closing connection");
                break;
            }
            msg = ws_rx.next() => msg,
        };

        let parsed = match msg {
            Some(Ok(Message::Text(text))) => parse_inbound(text.as_str()),
            Some(Ok(Message::Binary(data))) => parse_inbound_bytes(&data),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                connection.mark_alive();
                continue;
            }
            Some(Ok(Message::Close(_))) => {
                info!("client sent close frame");
                break;
            }
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let question = match parsed {
            Ok(Some(InboundFrame::Config { backend })) => {
                select_backend(&backend, &connection, &ctx).await;
                continue;
            }
            Ok(Some(InboundFrame::Question { content })) => content,
            Ok(None) => continue,
            Err(e) => {
                reject_malformed(&e);
                continue;
            }
        };

        if !admit_question(&connection, &busy, ctx.concurrent_questions).await {
            continue;
        }

        match question_tx.try_send(question) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("question queue full, turning question away");
                counter!(QUESTIONS_REJECTED_TOTAL).increment(1);
                if ctx.concurrent_questions == ConcurrentQuestionPolicy::Reject {
                    busy.store(false, Ordering::Release);
                }
                let _ = connection
                    .send_frame(&OutboundFrame::Error(BUSY_MESSAGE.into()))
                    .await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    connection.close();
}

/// Apply the concurrent-question policy. Returns whether the question should
/// be queued.
async fn admit_question(
    connection: &ClientConnection,
    busy: &AtomicBool,
    policy: ConcurrentQuestionPolicy,
) -> bool {
    let was_busy = busy.swap(true, Ordering::AcqRel);
    match policy {
        ConcurrentQuestionPolicy::Queue => true,
        ConcurrentQuestionPolicy::Reject if !was_busy => true,
        ConcurrentQuestionPolicy::Reject => {
            debug!("question arrived mid-answer, rejecting");
            counter!(QUESTIONS_REJECTED_TOTAL).increment(1);
            let _ = connection
                .send_frame(&OutboundFrame::Error(BUSY_MESSAGE.into()))
                .await;
            false
        }
    }
}

fn reject_malformed(error: &FrameError) {
    let reason = match error {
        FrameError::UnknownType(_) => "unknown_type",
        FrameError::MissingField(_) => "missing_field",
        FrameError::Unsupported => "unsupported",
        FrameError::InvalidEncoding => "invalid_encoding",
    };
    warn!(error = %error, "ignoring malformed frame");
    counter!(FRAMES_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Cancels the idle timer and removes the session when the connection ends.
struct Teardown {
    ctx: Arc<RelayContext>,
    connection: Arc<ClientConnection>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.connection.close();
        let session = self.ctx.sessions.remove(&self.connection.id);
        if let Some(session) = &session {
            let _ = self.ctx.idle.cancel(session);
        }
        self.ctx.connection_closed();

        info!(
            session_removed = session.is_some(),
            session_age_secs = session.as_ref().map(|s| s.age().as_secs()),
            exchanges = session.as_ref().map(|s| s.history_len()),
            frames_sent = self.connection.sent_count(),
            "client disconnected"
        );
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(self.connection.age().as_secs_f64());
    }
}
