use thiserror::Error;

/// Errors surfaced by the retrieval pipeline and its collaborators.
///
/// `Retrieval` and `AuthorizationCheck` are the two failure kinds callers of
/// [`crate::rag::AuthorizedRetriever`] must distinguish: the first comes from
/// similarity search, the second means no document may be released.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("authorization check failed: {0}")]
    AuthorizationCheck(String),
    #[error("authorization service error: {0}")]
    Fga(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, RagError::AuthorizationCheck(_))
    }
}
