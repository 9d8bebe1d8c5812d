//! Backend registry.
//!
//! Maps each [`Backend`] to the producer that answers for it. Built once at
//! startup and shared read-only by every session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_core::Backend;
use relay_settings::{BackendsSettings, LlmSettings};
use serde::Serialize;
use tracing::{info, warn};

use crate::openai::{ChatClient, ChatClientConfig};
use crate::pipeline::RagPipeline;
use crate::producer::{AnswerProducer, ProducerResult};
use crate::retriever::{Document, NoopRetriever, Retriever, StaticRetriever};

/// Availability of one backend, as reported to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Wire id.
    pub id: Backend,
    /// Whether a producer is registered for it.
    pub enabled: bool,
}

/// Backend → producer table.
#[derive(Clone)]
pub struct BackendRegistry {
    producers: HashMap<Backend, Arc<dyn AnswerProducer>>,
    default: Backend,
}

impl BackendRegistry {
    /// Empty registry falling back to `default`.
    pub fn new(default: Backend) -> Self {
        Self {
            producers: HashMap::new(),
            default,
        }
    }

    /// Build RAG pipelines for every configured backend, reading API keys
    /// from the process environment.
    pub fn from_settings(settings: &BackendsSettings, default: Backend) -> ProducerResult<Self> {
        Self::from_settings_with(settings, default, |name| std::env::var(name).ok())
    }

    /// Like [`Self::from_settings`] with an explicit key lookup.
    ///
    /// A backend whose `apiKeyEnv` resolves to nothing is left unregistered
    /// and reported as disabled.
    pub fn from_settings_with(
        settings: &BackendsSettings,
        default: Backend,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ProducerResult<Self> {
        let mut registry = Self::new(default);
        for (backend, llm) in settings.iter() {
            let api_key = match &llm.api_key_env {
                None => None,
                Some(var) => match lookup(var).filter(|k| !k.trim().is_empty()) {
                    Some(key) => Some(key),
                    None => {
                        warn!(backend = %backend, env = %var, "API key not set, backend disabled");
                        continue;
                    }
                },
            };
            let pipeline = build_pipeline(backend, llm, api_key)?;
            info!(backend = %backend, model = %llm.model, base_url = %llm.base_url, "backend registered");
            let _ = registry.producers.insert(backend, Arc::new(pipeline));
        }
        if !registry.producers.contains_key(&default) {
            warn!(backend = %default, "default backend is not available");
        }
        Ok(registry)
    }

    /// Register (or replace) the producer for `backend`.
    #[must_use]
    pub fn with_producer(mut self, backend: Backend, producer: Arc<dyn AnswerProducer>) -> Self {
        let _ = self.producers.insert(backend, producer);
        self
    }

    /// Backend used when a session never selects one.
    pub fn default_backend(&self) -> Backend {
        self.default
    }

    /// Producer for `backend`, or the default backend's producer when it is
    /// not registered. `None` only if neither is available.
    pub fn resolve(&self, backend: Backend) -> Option<Arc<dyn AnswerProducer>> {
        self.producers
            .get(&backend)
            .or_else(|| {
                if backend != self.default {
                    warn!(backend = %backend, fallback = %self.default, "backend unavailable, using default");
                }
                self.producers.get(&self.default)
            })
            .cloned()
    }

    /// Whether `backend` has its own producer.
    pub fn enabled(&self, backend: Backend) -> bool {
        self.producers.contains_key(&backend)
    }

    /// Every backend with its availability, in display order.
    pub fn status(&self) -> Vec<BackendStatus> {
        Backend::ALL
            .into_iter()
            .map(|id| BackendStatus {
                id,
                enabled: self.enabled(id),
            })
            .collect()
    }
}

fn build_pipeline(
    backend: Backend,
    llm: &LlmSettings,
    api_key: Option<String>,
) -> ProducerResult<RagPipeline> {
    let client = ChatClient::new(ChatClientConfig {
        base_url: llm.base_url.clone(),
        model: llm.model.clone(),
        temperature: llm.temperature,
        api_key,
        timeout: Duration::from_millis(llm.request_timeout_ms),
    })?;
    let retriever: Arc<dyn Retriever> = if llm.static_context.is_empty() {
        Arc::new(NoopRetriever)
    } else {
        Arc::new(StaticRetriever::new(
            llm.static_context.iter().map(Document::new).collect(),
        ))
    };
    Ok(RagPipeline::new(backend.id(), client, retriever).with_condense(llm.condense_question))
}
