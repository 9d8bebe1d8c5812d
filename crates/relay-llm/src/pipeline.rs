//! # RAG Pipeline
//!
//! The [`AnswerProducer`] behind every backend:
//!
//! 1. optionally condense a follow-up into a standalone question
//! 2. retrieve context documents for it
//! 3. fill the answer template with context, history and the question
//! 4. stream the completion
//!
//! Steps 1-3 fail before the first fragment and surface as the `Err` of
//! [`AnswerProducer::answer`]; step 4 failures arrive in the stream.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::Exchange;
use tracing::debug;

use crate::openai::{ChatClient, ChatMessage};
use crate::producer::{AnswerProducer, FragmentStream, ProducerResult};
use crate::prompts::{
    ANSWER_TEMPLATE, STANDALONE_QUESTION_TEMPLATE, format_chat_history, format_documents, render,
};
use crate::retriever::Retriever;

/// Retrieval-augmented answer producer.
pub struct RagPipeline {
    name: String,
    llm: ChatClient,
    retriever: Arc<dyn Retriever>,
    condense: bool,
}

impl RagPipeline {
    /// Pipeline answering with `llm` over documents from `retriever`.
    pub fn new(name: impl Into<String>, llm: ChatClient, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            name: name.into(),
            llm,
            retriever,
            condense: false,
        }
    }

    /// Rewrite follow-ups into standalone questions before retrieval.
    #[must_use]
    pub fn with_condense(mut self, condense: bool) -> Self {
        self.condense = condense;
        self
    }

    async fn search_query(&self, question: &str, chat_history: &str) -> ProducerResult<String> {
        if !self.condense || chat_history.is_empty() {
            return Ok(question.to_owned());
        }
        let prompt = render(STANDALONE_QUESTION_TEMPLATE, question, "", chat_history);
        let standalone = self.llm.complete(&[ChatMessage::user(prompt)]).await?;
        let standalone = standalone.trim();
        if standalone.is_empty() {
            return Ok(question.to_owned());
        }
        debug!(backend = %self.name, standalone, "condensed question");
        Ok(standalone.to_owned())
    }
}

#[async_trait]
impl AnswerProducer for RagPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn answer(&self, question: &str, history: &[Exchange]) -> ProducerResult<FragmentStream> {
        let chat_history = format_chat_history(history);
        let query = self.search_query(question, &chat_history).await?;
        let documents = self.retriever.retrieve(&query).await?;
        debug!(
            backend = %self.name,
            model = self.llm.model(),
            documents = documents.len(),
            history = history.len(),
            "answering"
        );

        let prompt = render(
            ANSWER_TEMPLATE,
            question,
            &format_documents(&documents),
            &chat_history,
        );
        self.llm.stream(&[ChatMessage::user(prompt)]).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::openai::ChatClientConfig;
    use crate::producer::ProducerError;
    use crate::retriever::{Document, NoopRetriever, StaticRetriever};

    /// Records every query it is asked.
    #[derive(Default)]
    struct RecordingRetriever {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Retriever for RecordingRetriever {
        async fn retrieve(&self, query: &str) -> ProducerResult<Vec<Document>> {
            self.queries.lock().unwrap().push(query.to_owned());
            Ok(vec![Document::new("Opening hours: 9-5 weekdays.")])
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(&self, _query: &str) -> ProducerResult<Vec<Document>> {
            Err(ProducerError::Retrieval {
                message: "index offline".into(),
            })
        }
    }

    fn llm(server: &MockServer) -> ChatClient {
        ChatClient::new(ChatClientConfig {
            base_url: server.uri(),
            model: "gemma3:1b".into(),
            temperature: 0.1,
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn sse(fragments: &[&str]) -> ResponseTemplate {
        let mut body = String::new();
        for f in fragments {
            let chunk = serde_json::json!({"choices": [{"delta": {"content": f}}]});
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    async fn collect(stream: FragmentStream) -> Vec<String> {
        stream.map(Result::unwrap).collect().await
    }

    #[tokio::test]
    async fn prompt_carries_context_history_and_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Opening hours: 9-5 weekdays."))
            .and(body_string_contains("User: Hi\\nAI: Hello!"))
            .and(body_string_contains("What are your hours?"))
            .respond_with(sse(&["We're ", "open 9-5."]))
            .expect(1)
            .mount(&server)
            .await;

        let retriever = Arc::new(StaticRetriever::new(vec![Document::new(
            "Opening hours: 9-5 weekdays.",
        )]));
        let pipeline = RagPipeline::new("upstash-gemma3-nomic", llm(&server), retriever);
        let history = [Exchange::new("Hi", "Hello!")];
        let stream = pipeline
            .answer("What are your hours?", &history)
            .await
            .unwrap();
        assert_eq!(collect(stream).await, ["We're ", "open 9-5."]);
    }

    #[tokio::test]
    async fn condensed_question_drives_retrieval() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": " What are the weekend opening hours? "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(sse(&["Closed."]))
            .mount(&server)
            .await;

        let retriever = Arc::new(RecordingRetriever::default());
        let pipeline =
            RagPipeline::new("supabase-gemini", llm(&server), retriever.clone()).with_condense(true);
        let history = [Exchange::new("When are you open?", "9-5 weekdays.")];
        let stream = pipeline.answer("And weekends?", &history).await.unwrap();

        assert_eq!(collect(stream).await, ["Closed."]);
        assert_eq!(
            *retriever.queries.lock().unwrap(),
            ["What are the weekend opening hours?"]
        );
    }

    #[tokio::test]
    async fn first_question_is_not_condensed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(sse(&["Hello!"]))
            .mount(&server)
            .await;

        let retriever = Arc::new(RecordingRetriever::default());
        let pipeline =
            RagPipeline::new("supabase-gemini", llm(&server), retriever.clone()).with_condense(true);
        let stream = pipeline.answer("Hi", &[]).await.unwrap();

        assert_eq!(collect(stream).await, ["Hello!"]);
        assert_eq!(*retriever.queries.lock().unwrap(), ["Hi"]);
    }

    #[tokio::test]
    async fn retrieval_failure_fails_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&["never"]))
            .expect(0)
            .mount(&server)
            .await;

        let pipeline = RagPipeline::new("x", llm(&server), Arc::new(FailingRetriever));
        let result = pipeline.answer("hours?", &[]).await;
        assert_matches!(result.map(|_| ()), Err(ProducerError::Retrieval { .. }));
    }

    #[tokio::test]
    async fn upstream_error_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let pipeline = RagPipeline::new("x", llm(&server), Arc::new(NoopRetriever));
        let result = pipeline.answer("hours?", &[]).await;
        assert_matches!(result.map(|_| ()), Err(ProducerError::Api { status: 503, .. }));
    }

    #[test]
    fn name_is_backend_id() {
        let client = ChatClient::new(ChatClientConfig {
            base_url: "http://127.0.0.1:1".into(),
            model: "m".into(),
            temperature: 0.0,
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let pipeline = RagPipeline::new("supabase-gemini", client, Arc::new(NoopRetriever));
        assert_eq!(pipeline.name(), "supabase-gemini");
    }
}
