//! HTTP client for an OpenFGA-compatible authorization service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::credentials::{Credentials, TokenProvider};
use super::model::TupleKey;
use crate::core::config::{Consistency, FgaSettings};
use crate::core::errors::RagError;
use crate::rag::{Authorizer, CheckRequest, CheckResult};

#[derive(Debug, Serialize)]
struct WireTupleKey<'a> {
    user: &'a str,
    relation: &'a str,
    object: &'a str,
}

impl<'a> From<&'a CheckRequest> for WireTupleKey<'a> {
    fn from(request: &'a CheckRequest) -> Self {
        Self {
            user: &request.user,
            relation: &request.relation,
            object: &request.object,
        }
    }
}

impl<'a> From<&'a TupleKey> for WireTupleKey<'a> {
    fn from(tuple: &'a TupleKey) -> Self {
        Self {
            user: &tuple.user,
            relation: &tuple.relation,
            object: &tuple.object,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchCheckItem<'a> {
    tuple_key: WireTupleKey<'a>,
    correlation_id: String,
}

#[derive(Debug, Serialize)]
struct BatchCheckBody<'a> {
    checks: Vec<BatchCheckItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
    consistency: &'static str,
}

#[derive(Debug, Deserialize)]
struct BatchCheckResponse {
    #[serde(default)]
    result: HashMap<String, BatchCheckSingleResult>,
}

#[derive(Debug, Deserialize)]
struct BatchCheckSingleResult {
    #[serde(default)]
    allowed: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Serialize)]
struct CheckBody<'a> {
    tuple_key: WireTupleKey<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
    consistency: &'static str,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

#[derive(Debug, Serialize)]
struct TupleKeys<'a> {
    tuple_keys: Vec<WireTupleKey<'a>>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    writes: TupleKeys<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WriteModelResponse {
    authorization_model_id: String,
}

/// Talks to one store of the authorization service.
#[derive(Debug, Clone)]
pub struct FgaClient {
    api_url: String,
    store_id: String,
    authorization_model_id: Option<String>,
    consistency: Consistency,
    max_batch_size: usize,
    max_parallel_requests: usize,
    client: Client,
    tokens: TokenProvider,
}

impl FgaClient {
    pub fn new(settings: &FgaSettings) -> Result<Self, RagError> {
        let store_id = settings
            .store_id
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .ok_or_else(|| RagError::Config("fga.store_id is required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| RagError::Fga(format!("failed to build HTTP client: {}", e)))?;

        let credentials = Credentials::from_settings(settings);
        tracing::debug!(
            api_url = %settings.api_url,
            store_id = %store_id,
            authenticated = credentials.is_authenticated(),
            "Authorization client configured"
        );

        Ok(Self {
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            store_id,
            authorization_model_id: settings
                .authorization_model_id
                .as_ref()
                .filter(|s| !s.trim().is_empty())
                .cloned(),
            consistency: settings.consistency,
            max_batch_size: settings.max_batch_size.max(1),
            max_parallel_requests: settings.max_parallel_requests.max(1),
            tokens: TokenProvider::new(credentials, client.clone()),
            client,
        })
    }

    /// Use `model_id` for subsequent checks and writes.
    pub fn with_authorization_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }

    fn store_url(&self, suffix: &str) -> String {
        format!("{}/stores/{}/{}", self.api_url, self.store_id, suffix)
    }

    async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        suffix: &str,
        body: &T,
    ) -> Result<R, RagError> {
        let url = self.store_url(suffix);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = self.tokens.bearer().await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Fga(format!("request to {} failed: {}", suffix, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.clear_cache().await;
            }
            return Err(RagError::Fga(format!(
                "{} returned HTTP {} - {}",
                suffix, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::Fga(format!("invalid {} response: {}", suffix, e)))
    }

    /// Single relationship check.
    pub async fn check(&self, request: &CheckRequest) -> Result<bool, RagError> {
        let body = CheckBody {
            tuple_key: request.into(),
            authorization_model_id: self.authorization_model_id.as_deref(),
            consistency: self.consistency.as_wire(),
        };
        let response: CheckResponse = self.post("check", &body).await?;
        Ok(response.allowed)
    }

    /// Answers every request, in order. Requests are sent in chunks of at
    /// most `max_batch_size`, up to `max_parallel_requests` at a time. Any
    /// failure, including a missing or errored item, fails the whole call.
    pub async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let pending: Vec<_> = requests
            .chunks(self.max_batch_size)
            .map(|chunk| self.batch_check_chunk(chunk))
            .collect();

        let chunks: Vec<Vec<CheckResult>> = stream::iter(pending)
            .buffered(self.max_parallel_requests)
            .try_collect()
            .await
            .map_err(|err| match err {
                RagError::AuthorizationCheck(_) => err,
                other => RagError::AuthorizationCheck(other.to_string()),
            })?;

        Ok(chunks.into_iter().flatten().collect())
    }

    async fn batch_check_chunk(&self, chunk: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError> {
        let correlation_ids: Vec<String> =
            chunk.iter().map(|_| Uuid::new_v4().to_string()).collect();

        let body = BatchCheckBody {
            checks: chunk
                .iter()
                .zip(&correlation_ids)
                .map(|(request, id)| BatchCheckItem {
                    tuple_key: request.into(),
                    correlation_id: id.clone(),
                })
                .collect(),
            authorization_model_id: self.authorization_model_id.as_deref(),
            consistency: self.consistency.as_wire(),
        };

        let response: BatchCheckResponse = self.post("batch-check", &body).await?;
        map_batch_results(chunk, &correlation_ids, response)
    }

    pub async fn write_tuples(&self, tuples: &[TupleKey]) -> Result<(), RagError> {
        if tuples.is_empty() {
            return Ok(());
        }
        let body = WriteBody {
            writes: TupleKeys {
                tuple_keys: tuples.iter().map(WireTupleKey::from).collect(),
            },
            authorization_model_id: self.authorization_model_id.as_deref(),
        };
        let _: Value = self.post("write", &body).await?;
        tracing::info!("Wrote {} relationship tuples", tuples.len());
        Ok(())
    }

    /// Uploads an authorization model and returns its id.
    pub async fn write_authorization_model(&self, model: &Value) -> Result<String, RagError> {
        let response: WriteModelResponse = self.post("authorization-models", model).await?;
        tracing::info!(
            model_id = %response.authorization_model_id,
            "Wrote authorization model"
        );
        Ok(response.authorization_model_id)
    }
}

fn map_batch_results(
    chunk: &[CheckRequest],
    correlation_ids: &[String],
    mut response: BatchCheckResponse,
) -> Result<Vec<CheckResult>, RagError> {
    if response.result.len() != chunk.len() {
        return Err(RagError::AuthorizationCheck(format!(
            "expected {} batch results, got {}",
            chunk.len(),
            response.result.len()
        )));
    }

    chunk
        .iter()
        .zip(correlation_ids)
        .map(|(request, id)| {
            let item = response.result.remove(id).ok_or_else(|| {
                RagError::AuthorizationCheck(format!(
                    "no result for {} {} {}",
                    request.user, request.relation, request.object
                ))
            })?;
            if let Some(error) = item.error {
                return Err(RagError::AuthorizationCheck(format!(
                    "check for {} {} {} failed: {}",
                    request.user, request.relation, request.object, error
                )));
            }
            let allowed = item.allowed.ok_or_else(|| {
                RagError::AuthorizationCheck(format!(
                    "result for {} {} {} carries neither allowed nor error",
                    request.user, request.relation, request.object
                ))
            })?;
            Ok(CheckResult { allowed })
        })
        .collect()
}

#[async_trait]
impl Authorizer for FgaClient {
    async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError> {
        FgaClient::batch_check(self, requests).await
    }
}
