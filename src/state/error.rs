use thiserror::Error;

use crate::core::errors::RagError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] RagError),

    #[error("Failed to initialize authorization client: {0}")]
    Authorization(#[source] RagError),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] RagError),

    #[error("Failed to index documents: {0}")]
    Index(#[source] RagError),
}
