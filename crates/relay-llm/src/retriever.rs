//! Retrieval of context documents.
//!
//! Vector search lives outside the relay; this module only defines the seam
//! and two in-process implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::producer::ProducerResult;

/// A retrieved piece of context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Text handed to the model.
    pub content: String,
    /// Where it came from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    /// Document without a source.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }
}

/// Finds documents relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Documents for `query`, most relevant first.
    async fn retrieve(&self, query: &str) -> ProducerResult<Vec<Document>>;
}

/// Retrieves nothing. The model answers from history alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    async fn retrieve(&self, _query: &str) -> ProducerResult<Vec<Document>> {
        Ok(Vec::new())
    }
}

/// Returns the same documents for every query.
#[derive(Clone, Debug, Default)]
pub struct StaticRetriever {
    documents: Vec<Document>,
}

impl StaticRetriever {
    /// Retriever over a fixed document set.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> ProducerResult<Vec<Document>> {
        Ok(self.documents.clone())
    }
}
