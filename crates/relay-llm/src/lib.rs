//! # relay-llm
//!
//! Everything that turns a question into a stream of answer fragments.
//!
//! - [`producer`]: the [`AnswerProducer`] trait the relay consumes
//! - [`sse`] / [`openai`]: streaming client for OpenAI-compatible endpoints
//! - [`retriever`] / [`prompts`]: retrieval context and prompt assembly
//! - [`pipeline`]: the retrieval-augmented [`RagPipeline`] producer
//! - [`registry`]: maps each [`relay_core::Backend`] to its producer

#![deny(unsafe_code)]

pub mod openai;
pub mod pipeline;
pub mod producer;
pub mod prompts;
pub mod registry;
pub mod retriever;
pub mod sse;

pub use pipeline::RagPipeline;
pub use producer::{AnswerProducer, FragmentStream, ProducerError, ProducerResult};
pub use registry::{BackendRegistry, BackendStatus};
pub use retriever::{Document, NoopRetriever, Retriever, StaticRetriever};
