//! Question answering over documents the asking user may see.

use std::sync::Arc;

use serde::Serialize;

use super::agent::{RetrievalAgent, RetrievalTool};
use super::authorized::{AuthorizedRetriever, Authorizer, CheckRequest};
use super::document::Document;
use super::prompt::PromptBuilder;
use super::retriever::{Retriever, VectorStoreRetriever};
use super::store::InMemoryVectorStore;
use crate::core::config::{LlmSettings, RetrievalSettings};
use crate::core::errors::RagError;
use crate::llm::{ChatRequest, LlmProvider};

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ids of the documents that were placed in the prompt, possibly fewer
    /// than were authorized when the context budget ran out.
    pub sources: Vec<String>,
}

/// Owns the long-lived collaborators; every [`ask`](Self::ask) builds its own
/// authorized retriever for the asking user.
#[derive(Clone)]
pub struct RagPipeline {
    store: Arc<InMemoryVectorStore>,
    llm: Arc<dyn LlmProvider>,
    authorizer: Arc<dyn Authorizer>,
    llm_settings: LlmSettings,
    retrieval: RetrievalSettings,
    prompt: PromptBuilder,
}

impl RagPipeline {
    pub fn new(
        store: Arc<InMemoryVectorStore>,
        llm: Arc<dyn LlmProvider>,
        authorizer: Arc<dyn Authorizer>,
        llm_settings: LlmSettings,
        retrieval: RetrievalSettings,
    ) -> Self {
        let prompt = PromptBuilder::from_settings(&retrieval);
        Self {
            store,
            llm,
            authorizer,
            llm_settings,
            retrieval,
            prompt,
        }
    }

    /// Builds the check request for `user_id` viewing `doc`, using the
    /// configured type and relation names (`user:juan viewer doc:public-doc`).
    pub fn check_request_for(&self, user_id: &str, doc: &Document) -> CheckRequest {
        CheckRequest::new(
            format!("{}:{}", self.retrieval.user_type, user_id),
            self.retrieval.relation.clone(),
            format!("{}:{}", self.retrieval.object_type, doc.id),
        )
    }

    /// Similarity search over the store, filtered to what `user_id` may view.
    pub fn authorized_retriever<'a>(&'a self, user_id: &'a str) -> impl Retriever + 'a {
        let base = VectorStoreRetriever::new(
            self.store.clone(),
            self.llm.clone(),
            self.llm_settings.embedding_model.clone(),
        )
        .with_top_k(self.retrieval.top_k)
        .with_score_threshold(self.retrieval.score_threshold);

        AuthorizedRetriever::new(base, self.authorizer.clone(), move |doc: &Document| {
            self.check_request_for(user_id, doc)
        })
    }

    /// Documents relevant to `question` that `user_id` is allowed to view.
    pub async fn retrieve_for(
        &self,
        user_id: &str,
        question: &str,
    ) -> Result<Vec<Document>, RagError> {
        self.authorized_retriever(user_id).retrieve(question).await
    }

    /// Retrieve, authorize, prompt, generate. Any retrieval or authorization
    /// failure stops the flow before the model is called.
    #[tracing::instrument(skip(self, question))]
    pub async fn ask(&self, user_id: &str, question: &str) -> Result<Answer, RagError> {
        let documents = self.retrieve_for(user_id, question).await?;
        tracing::info!(documents = documents.len(), "Authorized context ready");

        let (messages, included) = self.prompt.build_messages(question, &documents);
        if included.is_empty() && !documents.is_empty() {
            return Err(RagError::Config(format!(
                "retrieval.max_context_length ({}) cannot hold any of {} authorized documents",
                self.retrieval.max_context_length,
                documents.len()
            )));
        }
        let sources: Vec<String> = included.iter().map(|doc| doc.id.clone()).collect();

        let request = ChatRequest::new(messages).with_settings(&self.llm_settings);
        let text = self.llm.chat(request, &self.llm_settings.chat_model).await?;

        Ok(Answer { text, sources })
    }

    /// Like [`ask`](Self::ask), but the model drives retrieval through a
    /// search tool and may query several times before answering.
    #[tracing::instrument(skip(self, question))]
    pub async fn ask_agentic(&self, user_id: &str, question: &str) -> Result<Answer, RagError> {
        let tool = RetrievalTool::new(self.authorized_retriever(user_id));
        RetrievalAgent::new(self.llm.clone(), self.llm_settings.clone())
            .with_max_steps(self.retrieval.agent_max_steps)
            .run(&tool, question)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AgentDecision, ToolCall};
    use crate::rag::testing::{FakeLlm, TupleAuthorizer};

    async fn pipeline(llm: Arc<FakeLlm>, authorizer: TupleAuthorizer) -> RagPipeline {
        pipeline_with(llm, authorizer, RetrievalSettings::default()).await
    }

    async fn pipeline_with(
        llm: Arc<FakeLlm>,
        authorizer: TupleAuthorizer,
        retrieval: RetrievalSettings,
    ) -> RagPipeline {
        let store = Arc::new(InMemoryVectorStore::new());
        for doc in [
            Document::new("public-doc", "Zeko Advanced Systems Inc. public profile"),
            Document::new("private-doc", "Zeko forecast for fiscal year 2025"),
        ] {
            let vector = llm.vector_for(&doc.content);
            store.add(doc, vector).await.unwrap();
        }
        RagPipeline::new(
            store,
            llm,
            Arc::new(authorizer),
            LlmSettings::default(),
            retrieval,
        )
    }

    #[tokio::test]
    async fn juan_gets_answer_from_public_doc_only() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]));
        let pipeline = pipeline(llm.clone(), TupleAuthorizer::sample()).await;

        let answer = pipeline.ask("juan", "What is the forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.text, "canned answer");
        assert_eq!(answer.sources, vec!["public-doc"]);
        let system = &llm.last_messages()[0].content;
        assert!(system.contains("public profile"));
        assert!(!system.contains("fiscal year 2025"));
    }

    #[tokio::test]
    async fn admin_gets_both_docs() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]));
        let pipeline = pipeline(llm.clone(), TupleAuthorizer::sample()).await;

        let answer = pipeline.ask("admin", "What is the forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.sources, vec!["private-doc", "public-doc"]);
        assert!(llm.last_messages()[0].content.contains("fiscal year 2025"));
    }

    #[tokio::test]
    async fn authorization_outage_halts_before_generation() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]));
        let pipeline = pipeline(llm.clone(), TupleAuthorizer::sample().failing()).await;

        let err = pipeline.ask("juan", "What is the forecast for ZEKO?").await.unwrap_err();

        assert!(err.is_authorization_failure());
        assert_eq!(llm.chat_calls(), 0);
    }

    #[tokio::test]
    async fn sources_list_only_documents_in_the_prompt() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]));
        let retrieval = RetrievalSettings {
            max_context_length: 40,
            ..Default::default()
        };
        let pipeline = pipeline_with(llm.clone(), TupleAuthorizer::sample(), retrieval).await;

        let answer = pipeline.ask("admin", "What is the forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.sources, vec!["private-doc"]);
        let system = &llm.last_messages()[0].content;
        assert!(system.contains("Zeko forecast"));
        assert!(!system.contains("public profile"));
    }

    #[tokio::test]
    async fn context_budget_that_fits_nothing_is_an_error() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]));
        let retrieval = RetrievalSettings {
            max_context_length: 1,
            ..Default::default()
        };
        let pipeline = pipeline_with(llm.clone(), TupleAuthorizer::sample(), retrieval).await;

        let err = pipeline.ask("juan", "What is the forecast for ZEKO?").await.unwrap_err();

        assert!(matches!(err, RagError::Config(_)));
        assert_eq!(llm.chat_calls(), 0);
    }

    #[tokio::test]
    async fn agentic_ask_searches_as_the_asking_user() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]).with_script(vec![
            AgentDecision::ToolCalls(vec![ToolCall::new(
                "call_1",
                "search_documents",
                r#"{"query": "ZEKO forecast"}"#,
            )]),
            AgentDecision::Final("Only the public profile is available.".to_string()),
        ]));
        let pipeline = pipeline(llm.clone(), TupleAuthorizer::sample()).await;

        let answer = pipeline.ask_agentic("juan", "Show me forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.text, "Only the public profile is available.");
        assert_eq!(answer.sources, vec!["public-doc"]);
        let tool_message = llm.tool_turns()[1].last().cloned().unwrap();
        assert!(!tool_message.content.contains("fiscal year 2025"));
    }

    #[tokio::test]
    async fn agentic_ask_stops_on_authorization_outage() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]).with_script(vec![
            AgentDecision::ToolCalls(vec![ToolCall::new(
                "call_1",
                "search_documents",
                r#"{"query": "ZEKO forecast"}"#,
            )]),
        ]));
        let pipeline = pipeline(llm.clone(), TupleAuthorizer::sample().failing()).await;

        let err = pipeline.ask_agentic("juan", "Show me forecast for ZEKO?").await.unwrap_err();

        assert!(err.is_authorization_failure());
        assert_eq!(llm.chat_calls(), 1);
    }

    #[tokio::test]
    async fn check_requests_use_configured_names() {
        let llm = Arc::new(FakeLlm::new(&["zeko"]));
        let pipeline = pipeline(llm, TupleAuthorizer::sample()).await;

        let request = pipeline.check_request_for("juan", &Document::new("public-doc", ""));

        assert_eq!(request, CheckRequest::new("user:juan", "viewer", "doc:public-doc"));
    }
}
