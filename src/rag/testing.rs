//! Test doubles shared by the rag module tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::authorized::{Authorizer, CheckRequest, CheckResult};
use crate::core::errors::RagError;
use crate::llm::{AgentDecision, ChatMessage, ChatRequest, LlmProvider, ToolDefinition};

/// Embeds text as keyword counts and answers chats with a canned reply.
/// Tool-calling turns are played from a script.
pub struct FakeLlm {
    keywords: Vec<String>,
    fail: bool,
    script: Mutex<VecDeque<AgentDecision>>,
    tool_turns: Mutex<Vec<Vec<ChatMessage>>>,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl FakeLlm {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            fail: false,
            script: Mutex::new(VecDeque::new()),
            tool_turns: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Decisions returned by successive `chat_with_tools` calls; once the
    /// script runs out every turn answers "canned answer".
    pub fn with_script(self, script: Vec<AgentDecision>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    /// Messages seen by each `chat_with_tools` call, in order.
    pub fn tool_turns(&self) -> Vec<Vec<ChatMessage>> {
        self.tool_turns.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| lower.matches(k.as_str()).count() as f32)
            .collect()
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, RagError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Llm("fake chat failure".to_string()));
        }
        *self.last_messages.lock().unwrap() = request.messages;
        Ok("canned answer".to_string())
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, RagError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Llm("fake embedding failure".to_string()));
        }
        Ok(inputs.iter().map(|text| self.vector_for(text)).collect())
    }

    async fn chat_with_tools(
        &self,
        request: ChatRequest,
        _tools: &[ToolDefinition],
        _model_id: &str,
    ) -> Result<AgentDecision, RagError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Llm("fake chat failure".to_string()));
        }
        self.tool_turns.lock().unwrap().push(request.messages);
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| AgentDecision::Final("canned answer".to_string())))
    }
}

/// Allows exactly the listed (user, object) pairs; `user:*` grants everyone.
pub struct TupleAuthorizer {
    tuples: HashSet<(String, String)>,
    fail: bool,
    calls: AtomicUsize,
}

impl TupleAuthorizer {
    /// `user:*` may view `doc:public-doc`, `user:admin` may view `doc:private-doc`.
    pub fn sample() -> Self {
        let tuples = [("user:*", "doc:public-doc"), ("user:admin", "doc:private-doc")]
            .iter()
            .map(|(u, o)| (u.to_string(), o.to_string()))
            .collect();
        Self {
            tuples,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for TupleAuthorizer {
    async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResult>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Fga("connection refused".to_string()));
        }
        Ok(requests
            .iter()
            .map(|r| {
                assert_eq!(r.relation, "viewer");
                let allowed = self.tuples.contains(&(r.user.clone(), r.object.clone()))
                    || self.tuples.contains(&("user:*".to_string(), r.object.clone()));
                CheckResult { allowed }
            })
            .collect())
    }
}
