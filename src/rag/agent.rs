//! Agentic retrieval: the model searches the authorized documents through a
//! tool, rephrasing the question until it can answer.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use super::document::Document;
use super::pipeline::Answer;
use super::retriever::Retriever;
use crate::core::config::LlmSettings;
use crate::core::errors::RagError;
use crate::llm::{AgentDecision, ChatMessage, ChatRequest, LlmProvider, ToolCall, ToolDefinition};

pub const RETRIEVAL_TOOL_NAME: &str = "search_documents";

const AGENT_INSTRUCTIONS: &str = "Answer the user's question only based on context retrieved from provided tools. \
Only use the information provided by the tools. \
If you need more information, ask for it.";

const NO_DOCUMENTS: &str = "No documents matched the query.";

#[derive(Debug, Deserialize)]
struct RetrievalArgs {
    query: String,
}

/// Result of one tool call: the text handed to the model and the documents
/// behind it.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub documents: Vec<Document>,
}

/// Exposes a retriever to the model as a function taking `{"query": ...}`.
/// Retrieved documents are joined into one string for the tool message.
pub struct RetrievalTool<R> {
    name: String,
    description: String,
    retriever: R,
}

impl<R: Retriever> RetrievalTool<R> {
    pub fn new(retriever: R) -> Self {
        Self {
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: "Searches the documents the current user may view. \
                Pass a standalone search query rephrased from the user's question."
                .to_string(),
            retriever,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for the document store"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Reads the `query` out of the model-supplied JSON arguments.
    pub fn parse_query(&self, arguments: &str) -> Result<String, RagError> {
        let args: RetrievalArgs = serde_json::from_str(arguments)
            .map_err(|e| RagError::Llm(format!("invalid {} arguments: {}", self.name, e)))?;
        Ok(args.query)
    }

    /// Runs the retriever and joins the documents into the tool message text.
    /// Retriever errors, including authorization failures, pass through.
    pub async fn search(&self, query: &str) -> Result<ToolOutput, RagError> {
        let documents = self.retriever.retrieve(query).await?;
        let content = if documents.is_empty() {
            NO_DOCUMENTS.to_string()
        } else {
            documents
                .iter()
                .map(|doc| doc.content.trim())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        Ok(ToolOutput { content, documents })
    }
}

/// Tool-calling loop over a single [`RetrievalTool`].
pub struct RetrievalAgent {
    llm: Arc<dyn LlmProvider>,
    llm_settings: LlmSettings,
    max_steps: usize,
}

impl RetrievalAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, llm_settings: LlmSettings) -> Self {
        Self {
            llm,
            llm_settings,
            max_steps: crate::core::config::defaults::RETRIEVAL_AGENT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Lets the model call `tool` until it produces a final answer.
    ///
    /// A failed retrieval or authorization check ends the run with that
    /// error. Bad arguments and unknown tool names are reported back to the
    /// model as tool results. `sources` lists every document handed to the
    /// model, in first-seen order.
    pub async fn run<R: Retriever>(
        &self,
        tool: &RetrievalTool<R>,
        question: &str,
    ) -> Result<Answer, RagError> {
        let definitions = [tool.definition()];
        let mut messages = vec![
            ChatMessage::system(AGENT_INSTRUCTIONS),
            ChatMessage::user(question),
        ];
        let mut sources: Vec<String> = Vec::new();

        for step in 0..self.max_steps {
            let request = ChatRequest::new(messages.clone()).with_settings(&self.llm_settings);
            let decision = self
                .llm
                .chat_with_tools(request, &definitions, &self.llm_settings.chat_model)
                .await?;

            let calls = match decision {
                AgentDecision::Final(text) => {
                    tracing::info!(steps = step + 1, sources = sources.len(), "Agent answered");
                    return Ok(Answer { text, sources });
                }
                AgentDecision::ToolCalls(calls) => calls,
            };

            messages.push(ChatMessage::assistant_tool_calls(calls.clone()));
            for call in calls {
                let content = self.execute(tool, &call, &mut sources).await?;
                messages.push(ChatMessage::tool_result(call.id, content));
            }
        }

        Err(RagError::Llm(format!(
            "agent did not answer within {} steps",
            self.max_steps
        )))
    }

    async fn execute<R: Retriever>(
        &self,
        tool: &RetrievalTool<R>,
        call: &ToolCall,
        sources: &mut Vec<String>,
    ) -> Result<String, RagError> {
        if call.function.name != tool.name() {
            tracing::warn!(tool = %call.function.name, "Model called an unknown tool");
            return Ok(format!("Tool `{}` does not exist.", call.function.name));
        }

        let query = match tool.parse_query(&call.function.arguments) {
            Ok(query) => query,
            Err(err) => {
                tracing::warn!(error = %err, "Model sent malformed tool arguments");
                return Ok(format!("Tool `{}` failed: {}", tool.name(), err));
            }
        };

        let output = tool.search(&query).await?;
        tracing::debug!(documents = output.documents.len(), "Retrieval tool returned");
        for doc in output.documents {
            if !sources.contains(&doc.id) {
                sources.push(doc.id);
            }
        }
        Ok(output.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::authorized::{AuthorizedRetriever, CheckRequest};
    use crate::rag::retriever::VectorStoreRetriever;
    use crate::rag::store::InMemoryVectorStore;
    use crate::rag::testing::{FakeLlm, TupleAuthorizer};

    async fn store(llm: &FakeLlm) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        for doc in [
            Document::new("public-doc", "Zeko Advanced Systems Inc. public profile"),
            Document::new("private-doc", "Zeko forecast for fiscal year 2025"),
        ] {
            let vector = llm.vector_for(&doc.content);
            store.add(doc, vector).await.unwrap();
        }
        store
    }

    fn tool_for(
        user: &'static str,
        store: Arc<InMemoryVectorStore>,
        llm: Arc<FakeLlm>,
        authorizer: Arc<TupleAuthorizer>,
    ) -> RetrievalTool<impl Retriever> {
        let base = VectorStoreRetriever::new(store, llm, "kw");
        RetrievalTool::new(AuthorizedRetriever::new(base, authorizer, move |doc: &Document| {
            CheckRequest::new(format!("user:{}", user), "viewer", format!("doc:{}", doc.id))
        }))
    }

    fn search(id: &str, query: &str) -> AgentDecision {
        AgentDecision::ToolCalls(vec![ToolCall::new(
            id,
            RETRIEVAL_TOOL_NAME,
            json!({ "query": query }).to_string(),
        )])
    }

    #[tokio::test]
    async fn agent_answers_from_authorized_tool_results() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]).with_script(vec![
            search("call_1", "ZEKO forecast"),
            AgentDecision::Final("No forecast is available to you.".to_string()),
        ]));
        let tool = tool_for(
            "juan",
            store(&llm).await,
            llm.clone(),
            Arc::new(TupleAuthorizer::sample()),
        );
        let agent = RetrievalAgent::new(llm.clone(), LlmSettings::default());

        let answer = agent.run(&tool, "Show me forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.text, "No forecast is available to you.");
        assert_eq!(answer.sources, vec!["public-doc"]);
        let turns = llm.tool_turns();
        assert_eq!(turns.len(), 2);
        let tool_message = turns[1].last().unwrap();
        assert_eq!(tool_message.role, "tool");
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool_message.content.contains("public profile"));
        assert!(!tool_message.content.contains("fiscal year 2025"));
    }

    #[tokio::test]
    async fn admin_agent_sees_private_forecast() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]).with_script(vec![
            search("call_1", "ZEKO forecast"),
            AgentDecision::Final("Revenue grows in 2025.".to_string()),
        ]));
        let tool = tool_for(
            "admin",
            store(&llm).await,
            llm.clone(),
            Arc::new(TupleAuthorizer::sample()),
        );
        let agent = RetrievalAgent::new(llm.clone(), LlmSettings::default());

        let answer = agent.run(&tool, "Show me forecast for ZEKO?").await.unwrap();

        assert_eq!(answer.sources, vec!["private-doc", "public-doc"]);
        assert!(llm.tool_turns()[1].last().unwrap().content.contains("fiscal year 2025"));
    }

    #[tokio::test]
    async fn authorization_failure_ends_the_run() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "forecast"]).with_script(vec![
            search("call_1", "ZEKO forecast"),
            AgentDecision::Final("should not be reached".to_string()),
        ]));
        let authorizer = Arc::new(TupleAuthorizer::sample().failing());
        let tool = tool_for("juan", store(&llm).await, llm.clone(), authorizer.clone());
        let agent = RetrievalAgent::new(llm.clone(), LlmSettings::default());

        let err = agent.run(&tool, "Show me forecast for ZEKO?").await.unwrap_err();

        assert!(err.is_authorization_failure());
        assert_eq!(authorizer.calls(), 1);
        assert_eq!(llm.chat_calls(), 1);
    }

    #[tokio::test]
    async fn bad_arguments_and_unknown_tools_are_reported_to_the_model() {
        let llm = Arc::new(FakeLlm::new(&["zeko"]).with_script(vec![
            AgentDecision::ToolCalls(vec![
                ToolCall::new("call_1", RETRIEVAL_TOOL_NAME, "{\"q\": 1}"),
                ToolCall::new("call_2", "send_payment", "{}"),
            ]),
            AgentDecision::Final("I don't know.".to_string()),
        ]));
        let tool = tool_for(
            "juan",
            store(&llm).await,
            llm.clone(),
            Arc::new(TupleAuthorizer::sample()),
        );
        let agent = RetrievalAgent::new(llm.clone(), LlmSettings::default());

        let answer = agent.run(&tool, "forecast?").await.unwrap();

        assert!(answer.sources.is_empty());
        let last_turn = &llm.tool_turns()[1];
        let results: Vec<&ChatMessage> = last_turn.iter().filter(|m| m.role == "tool").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("invalid search_documents arguments"));
        assert!(results[1].content.contains("`send_payment` does not exist"));
    }

    #[tokio::test]
    async fn agent_gives_up_after_max_steps() {
        let llm = Arc::new(FakeLlm::new(&["zeko"]).with_script(vec![
            search("call_1", "zeko"),
            search("call_2", "zeko again"),
            search("call_3", "zeko once more"),
        ]));
        let tool = tool_for(
            "juan",
            store(&llm).await,
            llm.clone(),
            Arc::new(TupleAuthorizer::sample()),
        );
        let agent = RetrievalAgent::new(llm.clone(), LlmSettings::default()).with_max_steps(2);

        let err = agent.run(&tool, "forecast?").await.unwrap_err();

        assert!(matches!(err, RagError::Llm(ref m) if m.contains("2 steps")));
        assert_eq!(llm.chat_calls(), 2);
    }

    #[tokio::test]
    async fn empty_search_tells_the_model_nothing_matched() {
        let llm = Arc::new(FakeLlm::new(&["zeko", "weather"]));
        let tool = tool_for(
            "juan",
            store(&llm).await,
            llm.clone(),
            Arc::new(TupleAuthorizer::sample()),
        );

        let output = tool.search("weather").await.unwrap();

        assert_eq!(output.content, NO_DOCUMENTS);
        assert!(output.documents.is_empty());
    }
}
