//! Query intent classification and model-driven query expansion.

use std::sync::Arc;
use std::time::Duration;

use docmind_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

/// Keywords that mark a query as a request for breadth.
pub const DEFAULT_SUMMARY_KEYWORDS: [&str; 4] = ["summary", "summarize", "overview", "all"];

/// Budget for the expansion call when none is configured.
pub const DEFAULT_EXPANSION_TIMEOUT: Duration = Duration::from_secs(8);

/// Summary-vs-specific classification of a raw query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Wants a broad view of the document.
    Summary,
    /// Wants a particular fact.
    Specific,
}

impl QueryIntent {
    /// Case-insensitive substring match against `keywords`.
    ///
    /// This is a plain substring test, so "all" also matches inside words
    /// such as "recall".
    pub fn classify<S: AsRef<str>>(query: &str, keywords: &[S]) -> Self {
        let lowered = query.to_lowercase();
        if keywords
            .iter()
            .any(|kw| lowered.contains(&kw.as_ref().to_lowercase()))
        {
            QueryIntent::Summary
        } else {
            QueryIntent::Specific
        }
    }

    /// The keyword-extraction instruction for this branch.
    pub fn expansion_prompt(self, query: &str) -> String {
        match self {
            QueryIntent::Summary => format!(
                "Identify 3-5 main research topics or keywords that would be in a document related to: '{query}'. Return only the keywords separated by commas."
            ),
            QueryIntent::Specific => format!(
                "Expand this query into 5 technical keywords to improve document retrieval: '{query}'. Return only the keywords separated by commas."
            ),
        }
    }
}

/// Rewrites a query into `"<query>, <keywords>"` with one model call.
#[derive(Clone)]
pub struct QueryExpander {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            timeout: DEFAULT_EXPANSION_TIMEOUT,
        }
    }

    /// Caps how long the keyword call may take before the raw query is used.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Never fails: a model error or an expired budget yields the original query.
    pub async fn expand(&self, query: &str, intent: QueryIntent) -> String {
        let request = ProviderRequest::prompt(
            &self.model,
            intent.expansion_prompt(query),
            self.temperature,
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Query expansion timed out, using original query"
                );
                query.to_string()
            }
            Ok(Ok(response)) => {
                let keywords = response.message.content.trim();
                if keywords.is_empty() {
                    return query.to_string();
                }
                let expanded = format!("{query}, {keywords}");
                debug!(original = query, expanded = %expanded, "Expanded search query");
                expanded
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Query expansion failed, using original query");
                query.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docmind_core::error::ProviderError;
    use docmind_core::message::Message;
    use docmind_core::provider::ProviderResponse;
    use std::sync::Mutex;

    struct KeywordModel {
        reply: Result<&'static str, ()>,
        prompts: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl KeywordModel {
        fn ok(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                prompts: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        fn slow(reply: &'static str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(reply)
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                prompts: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Provider for KeywordModel {
        fn name(&self) -> &str {
            "keywords"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.reply {
                Ok(text) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: request.model,
                }),
                Err(()) => Err(ProviderError::RateLimited {
                    retry_after_secs: 30,
                }),
            }
        }
    }

    #[test]
    fn summary_keywords_any_case() {
        for q in [
            "Summarize the document",
            "give me an OVERVIEW",
            "List ALL findings",
            "executive summary please",
        ] {
            assert_eq!(
                QueryIntent::classify(q, &DEFAULT_SUMMARY_KEYWORDS),
                QueryIntent::Summary,
                "{q}"
            );
        }
    }

    #[test]
    fn substring_match_includes_embedded_all() {
        assert_eq!(
            QueryIntent::classify("what was the recall?", &DEFAULT_SUMMARY_KEYWORDS),
            QueryIntent::Summary
        );
    }

    #[test]
    fn specific_when_no_keyword() {
        assert_eq!(
            QueryIntent::classify("What learning rate was used?", &DEFAULT_SUMMARY_KEYWORDS),
            QueryIntent::Specific
        );
    }

    #[test]
    fn prompts_differ_by_branch() {
        let summary = QueryIntent::Summary.expansion_prompt("summarize");
        let specific = QueryIntent::Specific.expansion_prompt("dropout rate");
        assert!(summary.starts_with("Identify 3-5 main research topics"));
        assert!(specific.contains("'dropout rate'"));
        assert!(specific.starts_with("Expand this query into 5 technical keywords"));
    }

    #[tokio::test]
    async fn expansion_concatenates_keywords() {
        let model = Arc::new(KeywordModel::ok(" attention, transformer, encoder "));
        let expander = QueryExpander::new(model.clone(), "m", 0.1);
        let expanded = expander
            .expand("how does it work", QueryIntent::Specific)
            .await;
        assert_eq!(expanded, "how does it work, attention, transformer, encoder");
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expansion_failure_returns_original() {
        let expander = QueryExpander::new(Arc::new(KeywordModel::failing()), "m", 0.1);
        let expanded = expander.expand("summarize", QueryIntent::Summary).await;
        assert_eq!(expanded, "summarize");
    }

    #[tokio::test]
    async fn empty_expansion_returns_original() {
        let expander = QueryExpander::new(Arc::new(KeywordModel::ok("   ")), "m", 0.1);
        assert_eq!(expander.expand("q", QueryIntent::Specific).await, "q");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_expansion_falls_back_within_budget() {
        let model = Arc::new(KeywordModel::slow("never, used", Duration::from_secs(60)));
        let expander =
            QueryExpander::new(model.clone(), "m", 0.1).with_timeout(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let expanded = expander.expand("dropout rate", QueryIntent::Specific).await;

        assert_eq!(expanded, "dropout rate");
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_expansion_inside_budget_is_kept() {
        let model = Arc::new(KeywordModel::slow("dropout", Duration::from_secs(3)));
        let expander = QueryExpander::new(model, "m", 0.1).with_timeout(Duration::from_secs(5));
        assert_eq!(
            expander.expand("rate", QueryIntent::Specific).await,
            "rate, dropout"
        );
    }
}
