//! Conversation history.

use serde::{Deserialize, Serialize};

/// One completed question/answer round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// What the client asked.
    pub user: String,
    /// What the relay answered.
    pub ai: String,
}

impl Exchange {
    /// Build an exchange.
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ai: ai.into(),
        }
    }
}

/// Append-only list of exchanges for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<Exchange>);

impl History {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange.
    pub fn push(&mut self, exchange: Exchange) {
        self.0.push(exchange);
    }

    /// Number of exchanges.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been exchanged yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exchanges in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Exchange> {
        self.0.iter()
    }

    /// Borrow as a slice.
    pub fn as_slice(&self) -> &[Exchange] {
        &self.0
    }

    /// Most recent exchange.
    pub fn last(&self) -> Option<&Exchange> {
        self.0.last()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Exchange;
    type IntoIter = std::slice::Iter<'a, Exchange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
