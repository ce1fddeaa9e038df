//! Authorization-filtered retrieval.
//!
//! [`AuthorizedRetriever`] decorates any [`Retriever`]: every candidate it
//! returns is turned into a [`CheckRequest`], the requests go to an
//! [`Authorizer`] in a single batch, and only candidates answered with
//! `allowed` are released, in their original order.
//!
//! The filter is fail-closed. A failed or malformed authorization answer is
//! reported as [`RagError::AuthorizationCheck`]; it never degrades into "all
//! documents" or into a silently empty result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::document::Document;
use super::retriever::Retriever;
use crate::core::errors::RagError;

/// One relationship question: may `user` hold `relation` on `object`?
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckRequest {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl CheckRequest {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
}

impl CheckResult {
    pub fn allowed() -> Self {
        Self { allowed: true }
    }

    pub fn denied() -> Self {
        Self { allowed: false }
    }
}

/// A batch permission checker.
///
/// Implementations must answer every request: the returned vector has the
/// same length as `requests` and `results[i]` answers `requests[i]`.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError>;
}

#[async_trait]
impl<T: Authorizer + ?Sized> Authorizer for Arc<T> {
    async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError> {
        (**self).batch_check(requests).await
    }
}

/// Retriever wrapper that releases only documents the subject may view.
///
/// `build_request` carries the query context (subject, relation, object
/// naming); build one `AuthorizedRetriever` per subject.
pub struct AuthorizedRetriever<R, A, B> {
    retriever: R,
    authorizer: A,
    build_request: B,
}

impl<R, A, B> AuthorizedRetriever<R, A, B>
where
    R: Retriever,
    A: Authorizer,
    B: Fn(&Document) -> CheckRequest + Send + Sync,
{
    pub fn new(retriever: R, authorizer: A, build_request: B) -> Self {
        Self {
            retriever,
            authorizer,
            build_request,
        }
    }
}

#[async_trait]
impl<R, A, B> Retriever for AuthorizedRetriever<R, A, B>
where
    R: Retriever,
    A: Authorizer,
    B: Fn(&Document) -> CheckRequest + Send + Sync,
{
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RagError> {
        let candidates = self.retriever.retrieve(query).await?;
        if candidates.is_empty() {
            tracing::debug!("No candidates retrieved, skipping authorization");
            return Ok(candidates);
        }

        let requests: Vec<CheckRequest> = candidates
            .iter()
            .map(|doc| (self.build_request)(doc))
            .collect();

        let results = self
            .authorizer
            .batch_check(&requests)
            .await
            .map_err(|err| {
                tracing::warn!(
                    candidates = requests.len(),
                    error = %err,
                    "Authorization check failed, releasing no documents"
                );
                into_authorization_failure(err)
            })?;

        let total = candidates.len();
        let allowed = filter_allowed(candidates, &results)?;
        tracing::debug!(
            candidates = total,
            allowed = allowed.len(),
            "Filtered retrieval results"
        );
        Ok(allowed)
    }
}

/// Keeps the candidates whose result is `allowed`, preserving order.
///
/// A result list of a different length than the candidate list violates the
/// [`Authorizer`] contract and is rejected as a whole.
pub fn filter_allowed(
    candidates: Vec<Document>,
    results: &[CheckResult],
) -> Result<Vec<Document>, RagError> {
    if candidates.len() != results.len() {
        return Err(RagError::AuthorizationCheck(format!(
            "expected {} results, got {}",
            candidates.len(),
            results.len()
        )));
    }

    Ok(candidates
        .into_iter()
        .zip(results)
        .filter_map(|(doc, result)| result.allowed.then_some(doc))
        .collect())
}

fn into_authorization_failure(err: RagError) -> RagError {
    match err {
        RagError::AuthorizationCheck(_) => err,
        other => RagError::AuthorizationCheck(other.to_string()),
    }
}
