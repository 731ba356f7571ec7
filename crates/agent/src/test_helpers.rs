//! Shared test helpers for the agent crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docmind_core::error::{MemoryError, ProviderError, ToolError};
use docmind_core::message::{Message, MessageToolCall};
use docmind_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use docmind_core::retrieval::{Embedder, IndexedPassage, RetrievedPassage, TenantFilter, VectorIndex, WipeOutcome};
use docmind_core::tool::{Tool, ToolResult, query_argument, query_schema};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. Once the
/// queue is exhausted, the last response repeats. Every request is recorded.
pub struct SequentialMockProvider {
    responses: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        assert!(!responses.is_empty(), "SequentialMockProvider needs at least one response");
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, ""),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let idx = requests.len().min(self.responses.len() - 1);
        requests.push(request);
        self.responses[idx].clone()
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// Echoes `query` back and counts invocations.
pub struct EchoTool {
    name: &'static str,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl EchoTool {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Echoes the query"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        query_schema("Anything")
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        self.calls.lock().unwrap().push(query.to_string());
        Ok(ToolResult::ok(format!("echo: {query}")))
    }
}

/// Bag-of-words embedder: one dimension per known word.
pub struct WordEmbedder;

const VOCABULARY: [&str; 6] = ["transformer", "attention", "results", "summary", "cats", "dogs"];

#[async_trait]
impl Embedder for WordEmbedder {
    fn name(&self) -> &str {
        "words"
    }
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lowered = t.to_lowercase();
                let mut v: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|w| if lowered.contains(w) { 1.0 } else { 0.0 })
                    .collect();
                // Keep every vector non-zero so cosine similarity is defined.
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// An index whose every call fails.
pub struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    fn name(&self) -> &str {
        "down"
    }
    async fn query(&self, _: &[f32], _: usize, _: &TenantFilter) -> Result<Vec<RetrievedPassage>, MemoryError> {
        Err(MemoryError::QueryFailed("connection refused".into()))
    }
    async fn insert(&self, _: Vec<IndexedPassage>) -> Result<usize, MemoryError> {
        Err(MemoryError::Index("connection refused".into()))
    }
    async fn wipe(&self) -> Result<WipeOutcome, MemoryError> {
        Err(MemoryError::Index("connection refused".into()))
    }
}
