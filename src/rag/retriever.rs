use std::sync::Arc;

use async_trait::async_trait;

use super::document::Document;
use super::store::InMemoryVectorStore;
use crate::core::errors::RagError;
use crate::llm::LlmProvider;

/// Anything that turns a query into an ordered list of documents.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RagError>;
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RagError> {
        (**self).retrieve(query).await
    }
}

/// Similarity search over an [`InMemoryVectorStore`]: embed the query, take
/// the top `k` above the score threshold.
#[derive(Clone)]
pub struct VectorStoreRetriever {
    store: Arc<InMemoryVectorStore>,
    embedder: Arc<dyn LlmProvider>,
    embedding_model: String,
    top_k: usize,
    score_threshold: f32,
}

impl VectorStoreRetriever {
    pub fn new(
        store: Arc<InMemoryVectorStore>,
        embedder: Arc<dyn LlmProvider>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model: embedding_model.into(),
            top_k: crate::core::config::defaults::RETRIEVAL_TOP_K,
            score_threshold: crate::core::config::defaults::RETRIEVAL_SCORE_THRESHOLD,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RagError> {
        let inputs = [query.to_string()];
        let mut vectors = self
            .embedder
            .embed(&inputs, &self.embedding_model)
            .await
            .map_err(|e| RagError::Retrieval(format!("query embedding failed: {}", e)))?;

        let query_embedding = vectors
            .pop()
            .ok_or_else(|| RagError::Retrieval("no embedding returned for query".to_string()))?;

        let docs = self
            .store
            .search(&query_embedding, self.top_k, self.score_threshold)
            .await?;
        tracing::debug!(
            provider = self.embedder.name(),
            hits = docs.len(),
            "Similarity search finished"
        );
        Ok(docs)
    }
}
