//! In-process vector store.
//!
//! Brute-force cosine similarity over every stored embedding. Meant for the
//! handful of documents a demo corpus holds, not for large collections.

use std::cmp::Ordering;

use tokio::sync::RwLock;

use super::document::Document;
use crate::core::errors::RagError;

struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document. All embeddings in one store must share a dimension.
    pub async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<(), RagError> {
        if embedding.is_empty() {
            return Err(RagError::Retrieval(format!(
                "empty embedding for document {}",
                document.id
            )));
        }

        let mut entries = self.entries.write().await;
        if let Some(first) = entries.first() {
            if first.embedding.len() != embedding.len() {
                return Err(RagError::Retrieval(format!(
                    "embedding dimension mismatch for {}: {} != {}",
                    document.id,
                    embedding.len(),
                    first.embedding.len()
                )));
            }
        }
        entries.push(Entry {
            document,
            embedding,
        });
        Ok(())
    }

    /// Returns at most `k` documents scoring at least `threshold`, best
    /// first. Equal scores keep insertion order.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Document>, RagError> {
        let entries = self.entries.read().await;
        if let Some(first) = entries.first() {
            if first.embedding.len() != query_embedding.len() {
                return Err(RagError::Retrieval(format!(
                    "query dimension {} does not match store dimension {}",
                    query_embedding.len(),
                    first.embedding.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(query_embedding, &entry.embedding)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| entries[idx].document.clone().with_score(score))
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    async fn sample_store() -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store
            .add(Document::new("sky", "The sky is blue."), vec![0.9, 0.1, 0.0])
            .await
            .unwrap();
        store
            .add(Document::new("ocean", "The ocean is deep."), vec![0.5, 0.5, 0.0])
            .await
            .unwrap();
        store
            .add(Document::new("math", "Numbers."), vec![0.0, 0.1, 0.9])
            .await
            .unwrap();
        store
    }

    #[test]
    fn cosine_handles_identical_and_orthogonal_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn search_ranks_and_applies_threshold() {
        let store = sample_store().await;

        let docs = store.search(&[1.0, 0.0, 0.0], 10, 0.2).await.unwrap();

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["sky", "ocean"]);
        assert!(docs[0].score.unwrap() > docs[1].score.unwrap());
    }

    #[tokio::test]
    async fn search_respects_k() {
        let store = sample_store().await;
        let docs = store.search(&[1.0, 1.0, 1.0], 1, -1.0).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.add(Document::new("first", "a"), vec![1.0, 0.0]).await.unwrap();
        store.add(Document::new("second", "b"), vec![2.0, 0.0]).await.unwrap();

        let docs = store.search(&[1.0, 0.0], 2, 0.0).await.unwrap();

        assert_eq!(docs[0].id, "first");
        assert_eq!(docs[1].id, "second");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_retrieval_error() {
        let store = sample_store().await;

        let err = store.search(&[1.0, 0.0], 2, 0.0).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));

        let err = store
            .add(Document::new("bad", "x"), vec![1.0])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
        assert_eq!(store.len().await, 3);
    }
}
