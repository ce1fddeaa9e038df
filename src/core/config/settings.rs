//! Typed view of the merged configuration tree.

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fga: FgaSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
}

/// Read consistency requested from the authorization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Unspecified,
    MinimizeLatency,
    #[default]
    HigherConsistency,
}

impl Consistency {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Consistency::Unspecified => "UNSPECIFIED",
            Consistency::MinimizeLatency => "MINIMIZE_LATENCY",
            Consistency::HigherConsistency => "HIGHER_CONSISTENCY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FgaSettings {
    pub api_url: String,
    pub store_id: Option<String>,
    pub authorization_model_id: Option<String>,
    /// Pre-issued bearer token; ignored when client credentials are set.
    pub api_token: Option<String>,
    pub api_token_issuer: String,
    pub api_audience: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: u64,
    pub consistency: Consistency,
    pub max_batch_size: usize,
    pub max_parallel_requests: usize,
}

impl Default for FgaSettings {
    fn default() -> Self {
        Self {
            api_url: defaults::FGA_API_URL.to_string(),
            store_id: None,
            authorization_model_id: None,
            api_token: None,
            api_token_issuer: defaults::FGA_API_TOKEN_ISSUER.to_string(),
            api_audience: defaults::FGA_API_AUDIENCE.to_string(),
            client_id: None,
            client_secret: None,
            timeout_secs: defaults::FGA_TIMEOUT_SECS,
            consistency: Consistency::default(),
            max_batch_size: defaults::FGA_MAX_BATCH_SIZE,
            max_parallel_requests: defaults::FGA_MAX_PARALLEL_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_string(),
            api_key: None,
            chat_model: defaults::LLM_CHAT_MODEL.to_string(),
            embedding_model: defaults::LLM_EMBEDDING_MODEL.to_string(),
            temperature: Some(0.0),
            max_tokens: None,
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub documents_dir: String,
    pub top_k: usize,
    pub score_threshold: f32,
    pub relation: String,
    pub user_type: String,
    pub object_type: String,
    pub max_context_length: usize,
    pub include_citations: bool,
    /// Model turns the retrieval agent may take before giving up.
    pub agent_max_steps: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            documents_dir: defaults::RETRIEVAL_DOCUMENTS_DIR.to_string(),
            top_k: defaults::RETRIEVAL_TOP_K,
            score_threshold: defaults::RETRIEVAL_SCORE_THRESHOLD,
            relation: defaults::RETRIEVAL_RELATION.to_string(),
            user_type: defaults::RETRIEVAL_USER_TYPE.to_string(),
            object_type: defaults::RETRIEVAL_OBJECT_TYPE.to_string(),
            max_context_length: defaults::RETRIEVAL_MAX_CONTEXT_LENGTH,
            include_citations: false,
            agent_max_steps: defaults::RETRIEVAL_AGENT_MAX_STEPS,
        }
    }
}
