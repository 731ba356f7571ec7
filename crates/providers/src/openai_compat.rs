//! OpenAI-compatible provider implementation.
//!
//! Works with Groq and any other endpoint exposing `/chat/completions` with
//! native tool calling. Only non-streaming completions are used.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docmind_config::LlmConfig;
use docmind_core::error::ProviderError;
use docmind_core::message::{Message, MessageToolCall, Role};
use docmind_core::provider::*;
use docmind_core::store::{SecretSet, keys};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default Groq endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a Groq provider (convenience constructor).
    pub fn groq(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("groq", GROQ_BASE_URL, api_key, Duration::from_secs(60))
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl docmind_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            timestamp: chrono::Utc::now(),
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }
}

/// Builds a provider per request from the `GROQ_API_KEY` setting.
pub struct OpenAiCompatFactory {
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn build(&self, secrets: &SecretSet, model: &str) -> docmind_core::Result<Arc<dyn Provider>> {
        let api_key = secrets.require(keys::GROQ_API_KEY)?;
        if model.trim().is_empty() {
            return Err(ProviderError::ModelNotFound("model name is empty".into()).into());
        }
        let provider = OpenAiCompatProvider::new("groq", &self.base_url, api_key, self.timeout)?;
        Ok(Arc::new(provider))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmind_core::Provider;

    fn provider_for(server: &mockito::ServerGuard) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("groq", server.url(), "gsk_test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn groq_constructor() {
        let provider = OpenAiCompatProvider::groq("gsk_test").unwrap();
        assert_eq!(provider.name(), "groq");
        assert!(provider.base_url.contains("api.groq.com"));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are DocMind"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "search_internal_documents".into(),
            arguments: r#"{"query":"transformers"}"#.into(),
        }];
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "search_internal_documents");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "[paper.pdf] result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn factory_requires_api_key() {
        let factory = OpenAiCompatFactory::new(GROQ_BASE_URL, Duration::from_secs(5));
        let err = factory
            .build(&SecretSet::default(), "llama-3.3-70b-versatile")
            .err()
            .unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn factory_rejects_empty_model() {
        let factory = OpenAiCompatFactory::new(GROQ_BASE_URL, Duration::from_secs(5));
        let secrets: SecretSet = [(keys::GROQ_API_KEY.to_string(), "gsk".to_string())]
            .into_iter()
            .collect();
        let err = factory.build(&secrets, "  ").err().unwrap();
        assert!(matches!(
            err,
            docmind_core::Error::Provider(ProviderError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn complete_parses_text_answer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "model": "llama-3.3-70b-versatile",
                "choices": [{"message": {"role": "assistant", "content": "Hello Ada"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
            }"#,
            )
            .create_async()
            .await;

        let response = provider_for(&server)
            .complete(ProviderRequest::prompt("llama-3.3-70b-versatile", "hi", 0.1))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.message.content, "Hello Ada");
        assert!(response.message.tool_calls.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[tokio::test]
    async fn complete_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "model": "m",
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_9", "type": "function",
                     "function": {"name": "search_internal_documents", "arguments": "{\"query\":\"results\"}"}}
                ]}}]
            }"#,
            )
            .create_async()
            .await;

        let response = provider_for(&server)
            .complete(ProviderRequest::prompt("m", "what are the results?", 0.1))
            .await
            .unwrap();

        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].id, "call_9");
        assert_eq!(response.message.tool_calls[0].arguments, r#"{"query":"results"}"#);
    }

    #[tokio::test]
    async fn complete_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let _auth = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .create_async()
            .await;

        let err = provider_for(&server)
            .complete(ProviderRequest::prompt("m", "hi", 0.1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn complete_maps_unknown_model() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("POST", "/chat/completions")
            .with_status(404)
            .with_body(r#"{"error":{"code":"model_not_found"}}"#)
            .create_async()
            .await;

        let err = provider_for(&server)
            .complete(ProviderRequest::prompt("no-such-model", "hi", 0.1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound(m) if m == "no-such-model"));
    }

    #[tokio::test]
    async fn complete_rate_limit_reads_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;

        let err = provider_for(&server)
            .complete(ProviderRequest::prompt("m", "hi", 0.1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: 12
            }
        ));
    }
}
