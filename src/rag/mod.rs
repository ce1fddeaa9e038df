//! Retrieval-augmented generation with per-document authorization.
//!
//! - `AuthorizedRetriever`: filters any retriever's results through a batch permission check
//! - `VectorStoreRetriever` / `InMemoryVectorStore`: embedding similarity search
//! - `RagPipeline`: retrieve, authorize, prompt and generate for one user
//! - `RetrievalAgent`: lets a tool-calling model search the authorized documents itself

mod agent;
mod authorized;
mod cache;
mod document;
mod indexer;
mod pipeline;
mod prompt;
mod retriever;
mod store;
#[cfg(test)]
mod testing;

pub use agent::{RetrievalAgent, RetrievalTool, ToolOutput, RETRIEVAL_TOOL_NAME};
pub use authorized::{filter_allowed, AuthorizedRetriever, Authorizer, CheckRequest, CheckResult};
pub use cache::EmbeddingCache;
pub use document::{read_documents, Document};
pub use indexer::index_documents;
pub use pipeline::{Answer, RagPipeline};
pub use prompt::PromptBuilder;
pub use retriever::{Retriever, VectorStoreRetriever};
pub use store::InMemoryVectorStore;
