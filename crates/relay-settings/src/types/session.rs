//! Per-connection session behavior.

use relay_core::Backend;
use relay_core::constants::DEFAULT_REMINDER;
use serde::{Deserialize, Serialize};

/// What to do with a partially streamed answer when the client disconnects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialAnswerPolicy {
    /// History only records answers the client received in full.
    #[default]
    Discard,
    /// Record whatever was streamed before the disconnect.
    Keep,
}

/// What to do with a question that arrives while an answer is streaming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrentQuestionPolicy {
    /// Hold it and answer once the current stream ends.
    #[default]
    Queue,
    /// Answer it immediately with an `error` frame.
    Reject,
}

/// Session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Idle time after a completed exchange before the reminder is sent.
    pub idle_timeout_ms: u64,
    /// Text of the idle reminder.
    pub reminder_message: String,
    /// Backend for sessions that never send a `config` frame.
    pub default_backend: Backend,
    /// Partial-answer handling on disconnect.
    pub partial_answers: PartialAnswerPolicy,
    /// Handling of questions that arrive mid-stream.
    pub concurrent_questions: ConcurrentQuestionPolicy,
    /// Abandon an answer stream after this long; `0` disables the guard.
    pub max_stream_duration_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 10 * 60 * 1000,
            reminder_message: DEFAULT_REMINDER.to_string(),
            default_backend: Backend::default(),
            partial_answers: PartialAnswerPolicy::Discard,
            concurrent_questions: ConcurrentQuestionPolicy::Queue,
            max_stream_duration_ms: 5 * 60 * 1000,
        }
    }
}
