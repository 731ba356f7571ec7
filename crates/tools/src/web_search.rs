//! Web search tool backed by the DuckDuckGo Instant Answer API.
//!
//! The backend is created once at process start; [`init_web_search`]
//! returns `None` when the capability is disabled or could not be set up,
//! and the tool registry then leaves `search_web` out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docmind_config::WebSearchConfig;
use docmind_core::error::ToolError;
use docmind_core::tool::{Tool, ToolResult, query_argument, query_schema};
use docmind_core::web::{WebResult, WebSearchBackend};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const WEB_SEARCH_TOOL: &str = "search_web";

pub struct DuckDuckGoSearch {
    endpoint: String,
    max_results: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        max_results: usize,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docmind/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: WEB_SEARCH_TOOL.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            max_results,
            timeout,
            client,
        })
    }

    pub fn from_config(config: &WebSearchConfig) -> Result<Self, ToolError> {
        Self::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
            config.max_results,
        )
    }

    fn failure(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: WEB_SEARCH_TOOL.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<WebResult>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text, first_url } => {
                let title = text.split(" - ").next().unwrap_or(&text).to_string();
                out.push(WebResult {
                    title,
                    snippet: text,
                    url: first_url,
                });
            }
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

#[async_trait]
impl WebSearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<WebResult>, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: WEB_SEARCH_TOOL.into(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    Self::failure(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::failure(format!("HTTP {}", response.status())));
        }

        // The API answers with a JavaScript content type; parse the body as text.
        let body = response
            .text()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;
        let answer: InstantAnswer =
            serde_json::from_str(&body).map_err(|e| Self::failure(format!("bad response: {e}")))?;

        let mut results = Vec::new();
        if !answer.answer.is_empty() {
            results.push(WebResult {
                title: "Answer".into(),
                snippet: answer.answer,
                url: String::new(),
            });
        }
        if !answer.abstract_text.is_empty() {
            results.push(WebResult {
                title: answer.heading,
                snippet: answer.abstract_text,
                url: answer.abstract_url,
            });
        }
        flatten_topics(answer.related_topics, &mut results);
        results.truncate(self.max_results);

        debug!(query, count = results.len(), "Web search");
        Ok(results)
    }
}

/// Build the process-wide web search backend, or `None` when unavailable.
pub fn init_web_search(config: &WebSearchConfig) -> Option<Arc<dyn WebSearchBackend>> {
    if !config.enabled {
        info!("Web search disabled by configuration");
        return None;
    }
    match DuckDuckGoSearch::from_config(config) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "Web search unavailable");
            None
        }
    }
}

fn format_results(query: &str, results: &[WebResult]) -> String {
    if results.is_empty() {
        return format!("No web results found for '{query}'.");
    }
    results
        .iter()
        .map(|r| {
            if r.url.is_empty() {
                format!("{}: {}", r.title, r.snippet)
            } else {
                format!("{}: {} ({})", r.title, r.snippet, r.url)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `search_web`: thin pass-through to the web search backend.
pub struct WebSearchTool {
    backend: Arc<dyn WebSearchBackend>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn WebSearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Searches the web for general knowledge, news, or facts NOT present in the user's documents."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema("The web search query")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        match self.backend.search(query).await {
            Ok(results) => Ok(ToolResult::ok(format_results(query, &results))),
            Err(e) => {
                warn!(error = %e, "Web search failed");
                Ok(ToolResult {
                    call_id: String::new(),
                    success: false,
                    output: format!("Web search failed: {e}"),
                })
            }
        }
    }
}
