pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{AgentDecision, ChatMessage, ChatRequest, FunctionCall, ToolCall, ToolDefinition};
