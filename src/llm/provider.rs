use async_trait::async_trait;

use super::types::{AgentDecision, ChatRequest, ToolDefinition};
use crate::core::errors::RagError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError>;

    /// generate embeddings, one vector per input in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, RagError>;

    /// chat completion that may answer with tool calls instead of text
    async fn chat_with_tools(
        &self,
        _request: ChatRequest,
        _tools: &[ToolDefinition],
        _model_id: &str,
    ) -> Result<AgentDecision, RagError> {
        Err(RagError::Llm(format!(
            "provider {} does not support tool calling",
            self.name()
        )))
    }
}
