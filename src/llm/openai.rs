use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::{AgentDecision, ChatRequest, ToolCall, ToolDefinition};
use crate::core::config::LlmSettings;
use crate::core::errors::RagError;

/// Provider for any server speaking the OpenAI chat/embeddings HTTP API.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, RagError> {
        Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn complete(&self, body: &Value) -> Result<Value, RagError> {
        let res = self
            .post("/v1/chat/completions")
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::Llm(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("chat error: HTTP {} - {}", status, text)));
        }

        res.json().await.map_err(|e| RagError::Llm(e.to_string()))
    }
}

fn completion_body(request: ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
    }
    body
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError> {
        let body = completion_body(request, model_id);
        let payload = self.complete(&body).await?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RagError::Llm("chat response has no message content".to_string()))
    }

    async fn chat_with_tools(
        &self,
        request: ChatRequest,
        tools: &[ToolDefinition],
        model_id: &str,
    ) -> Result<AgentDecision, RagError> {
        let mut body = completion_body(request, model_id);
        if let Some(obj) = body.as_object_mut() {
            obj.insert(
                "tools".to_string(),
                Value::Array(tools.iter().map(ToolDefinition::to_wire).collect()),
            );
            obj.insert("tool_choice".to_string(), json!("auto"));
        }

        let payload = self.complete(&body).await?;
        let message = &payload["choices"][0]["message"];

        let tool_calls: Vec<ToolCall> = match message.get("tool_calls") {
            Some(Value::Array(calls)) if !calls.is_empty() => {
                serde_json::from_value(Value::Array(calls.clone()))
                    .map_err(|e| RagError::Llm(format!("invalid tool_calls: {}", e)))?
            }
            _ => Vec::new(),
        };
        if !tool_calls.is_empty() {
            return Ok(AgentDecision::ToolCalls(tool_calls));
        }

        message["content"]
            .as_str()
            .map(|text| AgentDecision::Final(text.to_string()))
            .ok_or_else(|| RagError::Llm("chat response has neither content nor tool calls".to_string()))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": model_id,
            "input": inputs,
            "encoding_format": "float",
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Llm(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("embed error: HTTP {} - {}", status, text)));
        }

        let mut payload: EmbeddingResponse =
            res.json().await.map_err(|e| RagError::Llm(e.to_string()))?;

        if payload.data.len() != inputs.len() {
            return Err(RagError::Llm(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        payload.data.sort_by_key(|item| item.index);
        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}
