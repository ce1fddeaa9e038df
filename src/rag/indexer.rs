use super::cache::EmbeddingCache;
use super::document::Document;
use super::store::InMemoryVectorStore;
use crate::core::errors::RagError;
use crate::llm::LlmProvider;

/// Embeds `documents` into `store`, asking the provider only for documents
/// the cache has not seen. Returns how many were freshly embedded.
pub async fn index_documents(
    store: &InMemoryVectorStore,
    embedder: &dyn LlmProvider,
    embedding_model: &str,
    cache: &mut EmbeddingCache,
    documents: Vec<Document>,
) -> Result<usize, RagError> {
    let missing: Vec<String> = documents
        .iter()
        .filter(|doc| cache.get(embedding_model, &doc.content).is_none())
        .map(|doc| doc.content.clone())
        .collect();

    if !missing.is_empty() {
        tracing::info!(
            "Embedding {} of {} documents with {}",
            missing.len(),
            documents.len(),
            embedding_model
        );
        let vectors = embedder
            .embed(&missing, embedding_model)
            .await
            .map_err(|e| RagError::Retrieval(format!("document embedding failed: {}", e)))?;
        if vectors.len() != missing.len() {
            return Err(RagError::Retrieval(format!(
                "expected {} document embeddings, got {}",
                missing.len(),
                vectors.len()
            )));
        }
        for (text, vector) in missing.iter().zip(vectors) {
            cache.insert(embedding_model, text, vector);
        }
        if let Err(err) = cache.save() {
            tracing::warn!("Failed to persist embedding cache: {}", err);
        }
    }

    for doc in documents {
        let embedding = cache
            .get(embedding_model, &doc.content)
            .cloned()
            .ok_or_else(|| RagError::internal(format!("no embedding cached for {}", doc.id)))?;
        store.add(doc, embedding).await?;
    }

    Ok(missing.len())
}
