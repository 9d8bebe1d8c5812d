//! # Streaming Coordinator
//!
//! Runs one question through the session's answer producer and turns the
//! fragment stream into client frames:
//!
//! - every fragment becomes a `chunk` frame, in production order
//! - completion sends one `end` frame with the whole answer, then records
//!   the exchange
//! - a producer failure sends one generic `error` frame and records nothing
//! - a closed connection stops consumption at once; nothing more is sent
//!
//! Producer errors stop here. Nothing from the producer can end the
//! connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use metrics::{counter, histogram};
use relay_core::constants::{GENERIC_ERROR_MESSAGE, TIMEOUT_MESSAGE};
use relay_core::{Exchange, OutboundFrame};
use relay_llm::{AnswerProducer, BackendRegistry, ProducerError};
use relay_settings::PartialAnswerPolicy;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{ANSWER_DURATION_SECONDS, ANSWERS_TOTAL, PRODUCER_ERRORS_TOTAL};
use crate::session::Session;
use crate::websocket::connection::ClientConnection;

/// How an answer stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `end` was sent and the exchange recorded.
    Completed,
    /// The connection closed mid-stream.
    Disconnected,
    /// The producer failed; one `error` frame was sent.
    Failed,
    /// The stream ran past the maximum duration; one `error` frame was sent.
    TimedOut,
}

impl StreamOutcome {
    /// Metrics label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Where the fragment loop stopped.
enum Consumed {
    Finished(String),
    Disconnected(String),
    Failed(ProducerError),
}

/// Drives answer streams for every session.
pub struct StreamCoordinator {
    registry: Arc<BackendRegistry>,
    partial_answers: PartialAnswerPolicy,
    max_duration: Option<Duration>,
}

impl StreamCoordinator {
    /// Coordinator resolving producers from `registry`.
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            partial_answers: PartialAnswerPolicy::default(),
            max_duration: None,
        }
    }

    /// What to record when the client leaves mid-answer.
    #[must_use]
    pub fn with_partial_answers(mut self, policy: PartialAnswerPolicy) -> Self {
        self.partial_answers = policy;
        self
    }

    /// Abandon streams that run longer than `limit`. `None` disables.
    #[must_use]
    pub fn with_max_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_duration = limit;
        self
    }

    /// Backend registry.
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Answer `question` on `connection` using `session`'s backend and
    /// history.
    #[instrument(skip_all, fields(connection_id = %connection.id, backend = %session.backend()))]
    pub async fn run(
        &self,
        connection: &ClientConnection,
        question: &str,
        session: &Session,
    ) -> StreamOutcome {
        let backend = session.backend();
        let Some(producer) = self.registry.resolve(backend) else {
            warn!("no producer available");
            let _ = connection
                .send_frame(&OutboundFrame::Error(GENERIC_ERROR_MESSAGE.into()))
                .await;
            counter!(ANSWERS_TOTAL, "backend" => backend.id(), "outcome" => "failed").increment(1);
            return StreamOutcome::Failed;
        };

        let _streaming = session.begin_stream();
        let started = Instant::now();
        let history = session.history();
        let consume = consume(connection, producer.as_ref(), question, history.as_slice());

        let consumed = match self.max_duration {
            Some(limit) => tokio::time::timeout(limit, consume).await.ok(),
            None => Some(consume.await),
        };

        let outcome = match consumed {
            Some(Consumed::Finished(answer)) => {
                if connection
                    .send_frame(&OutboundFrame::End(answer.clone()))
                    .await
                {
                    debug!(chars = answer.len(), "answer complete");
                    session.record(Exchange::new(question, answer));
                    StreamOutcome::Completed
                } else {
                    self.disconnected(session, question, answer)
                }
            }
            Some(Consumed::Disconnected(partial)) => self.disconnected(session, question, partial),
            Some(Consumed::Failed(error)) => {
                warn!(error = %error, category = error.category(), "answer failed");
                counter!(
                    PRODUCER_ERRORS_TOTAL,
                    "backend" => backend.id(),
                    "category" => error.category()
                )
                .increment(1);
                let _ = connection
                    .send_frame(&OutboundFrame::Error(GENERIC_ERROR_MESSAGE.into()))
                    .await;
                StreamOutcome::Failed
            }
            None => {
                warn!(limit_secs = self.max_duration.map(|d| d.as_secs()), "answer timed out");
                let _ = connection
                    .send_frame(&OutboundFrame::Error(TIMEOUT_MESSAGE.into()))
                    .await;
                StreamOutcome::TimedOut
            }
        };

        counter!(ANSWERS_TOTAL, "backend" => backend.id(), "outcome" => outcome.label())
            .increment(1);
        histogram!(ANSWER_DURATION_SECONDS, "backend" => backend.id())
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    fn disconnected(&self, session: &Session, question: &str, partial: String) -> StreamOutcome {
        let keep = self.partial_answers == PartialAnswerPolicy::Keep && !partial.is_empty();
        info!(chars = partial.len(), kept = keep, "client left mid-answer");
        if keep {
            session.record(Exchange::new(question, partial));
        }
        StreamOutcome::Disconnected
    }
}

/// Pull fragments until the stream ends, fails, or the connection closes.
///
/// Connection state is checked before every pull and every send, so a
/// fragment produced after close is dropped.
async fn consume(
    connection: &ClientConnection,
    producer: &dyn AnswerProducer,
    question: &str,
    history: &[Exchange],
) -> Consumed {
    let mut stream = tokio::select! {
        biased;
        () = connection.closed() => return Consumed::Disconnected(String::new()),
        started = producer.answer(question, history) => match started {
            Ok(stream) => stream,
            Err(e) => return Consumed::Failed(e),
        },
    };

    let mut answer = String::new();
    loop {
        let next = tokio::select! {
            biased;
            () = connection.closed() => return Consumed::Disconnected(answer),
            next = stream.next() => next,
        };
        match next {
            None => return Consumed::Finished(answer),
            Some(Err(e)) => return Consumed::Failed(e),
            Some(Ok(fragment)) if fragment.is_empty() => {}
            Some(Ok(fragment)) => {
                if !connection
                    .send_frame(&OutboundFrame::Chunk(fragment.clone()))
                    .await
                {
                    return Consumed::Disconnected(answer);
                }
                answer.push_str(&fragment);
            }
        }
    }
}
