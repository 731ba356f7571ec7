//! One chat request, end to end.
//!
//! Resolve settings, history and profile concurrently, build the provider
//! and tool set from the live secrets, assemble the system prompt, then run
//! the conversation loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use docmind_config::AgentConfig;
use docmind_core::Error;
use docmind_core::error::ProviderError;
use docmind_core::identity::IdentityContext;
use docmind_core::provider::ProviderFactory;
use docmind_core::request::{ChatRequest, ChatResponse};
use docmind_memory::{ConfigResolver, HistoryAdapter, ProfileAdapter};
use docmind_tools::ToolSetBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::conversation::{ConversationLoop, LoopError, LoopSettings};
use crate::prompt::PromptAssembler;

/// Reply used when the loop ends without any text.
pub const EMPTY_ANSWER_FALLBACK: &str = "I'm sorry, I couldn't generate a response.";

/// Request-level failures. Everything else becomes text in the response.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A required secret is missing. Not retried.
    #[error("API Keys not configured: {0}")]
    Configuration(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Building the provider or tool set failed for a reason other than
    /// missing settings.
    #[error("Service setup failed: {0}")]
    Setup(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ChatError {
    fn from_setup(e: Error) -> Self {
        match e {
            Error::Config { message } => ChatError::Configuration(message),
            Error::Provider(ProviderError::ModelNotFound(model)) => ChatError::InvalidModel(model),
            Error::Provider(ProviderError::NotConfigured(what)) => ChatError::Configuration(what),
            other => ChatError::Setup(other.to_string()),
        }
    }
}

/// Process-wide chat settings.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub assistant_name: String,
    pub temperature: f32,
    pub agent: AgentConfig,
    pub model_timeout: Duration,
}

/// Answers chat requests. Shared read-only across requests.
pub struct ChatService {
    settings_store: ConfigResolver,
    history: HistoryAdapter,
    profiles: ProfileAdapter,
    providers: Arc<dyn ProviderFactory>,
    tools: ToolSetBuilder,
    prompt: PromptAssembler,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        settings_store: ConfigResolver,
        history: HistoryAdapter,
        profiles: ProfileAdapter,
        providers: Arc<dyn ProviderFactory>,
        tools: ToolSetBuilder,
        settings: ChatSettings,
    ) -> Self {
        Self {
            settings_store,
            history,
            profiles,
            providers,
            tools,
            prompt: PromptAssembler::new(),
            settings,
        }
    }

    pub fn history(&self) -> &HistoryAdapter {
        &self.history
    }

    pub async fn handle(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ChatError> {
        info!(
            session_id = %request.session_id,
            user_id = %request.user_id,
            model = %request.model_name,
            use_web = request.use_web,
            "Chat request"
        );

        let setup = async {
            tokio::join!(
                self.settings_store.resolve(),
                self.history.load_recent(&request.session_id),
                self.profiles.load_identity(&request.user_id),
            )
        };
        let (secrets, history, display_name) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            resolved = setup => resolved,
        };

        let provider = self
            .providers
            .build(&secrets, &request.model_name)
            .map_err(ChatError::from_setup)?;

        let tool_set = self
            .tools
            .build(
                &secrets,
                &request.user_id,
                provider.clone(),
                &request.model_name,
                self.settings.temperature,
                request.use_web,
            )
            .map_err(ChatError::from_setup)?;

        let identity = IdentityContext::new(&self.settings.assistant_name, display_name);
        let system_prompt = self.prompt.build_system_prompt(
            &identity,
            Local::now().date_naive(),
            tool_set.web_search_active,
        );

        let loop_settings = LoopSettings::from_config(
            &self.settings.agent,
            &request.model_name,
            self.settings.temperature,
            self.settings.model_timeout,
        );
        let conversation = ConversationLoop::new(provider, &tool_set.registry, loop_settings);

        match conversation
            .run(&system_prompt, &history, &request.query, cancel)
            .await
        {
            Ok(outcome) => {
                info!(
                    session_id = %request.session_id,
                    iterations = outcome.iterations,
                    tools_used = outcome.scratchpad.len(),
                    stop = ?outcome.stop,
                    "Chat answered"
                );
                let answer = if outcome.answer.trim().is_empty() {
                    EMPTY_ANSWER_FALLBACK.to_string()
                } else {
                    outcome.answer
                };
                Ok(ChatResponse::new(answer))
            }
            Err(LoopError::Cancelled) => {
                warn!(session_id = %request.session_id, "Chat request cancelled");
                Err(ChatError::Cancelled)
            }
            Err(LoopError::Provider(e)) => {
                error!(session_id = %request.session_id, error = %e, "Model call failed");
                Ok(ChatResponse::new(format!("AI Error: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use docmind_config::{EarlyStopping, RetrievalConfig};
    use docmind_core::error::MemoryError;
    use docmind_core::message::{ConversationTurn, Role};
    use docmind_core::provider::Provider;
    use docmind_core::retrieval::{Embedder, IndexedPassage, VectorIndex};
    use docmind_core::store::{HistoryStore, ProfileStore, SecretSet, keys};
    use docmind_memory::{InMemoryStore, InMemoryVectorIndex, SharedIndexFactory};
    use serde_json::json;

    /// Hands out one scripted provider; requires the chat key like the real factory.
    struct FixedFactory(Arc<SequentialMockProvider>);

    impl ProviderFactory for FixedFactory {
        fn build(&self, secrets: &SecretSet, model: &str) -> docmind_core::Result<Arc<dyn Provider>> {
            secrets.require(keys::GROQ_API_KEY)?;
            if model.trim().is_empty() {
                return Err(ProviderError::ModelNotFound("model name is empty".into()).into());
            }
            Ok(self.0.clone())
        }
    }

    fn settings() -> ChatSettings {
        ChatSettings {
            assistant_name: "DocMind".into(),
            temperature: 0.1,
            agent: AgentConfig {
                max_iterations: 3,
                early_stopping: EarlyStopping::Force,
                ..AgentConfig::default()
            },
            model_timeout: Duration::from_secs(5),
        }
    }

    fn service(store: InMemoryStore, index: Arc<dyn VectorIndex>, provider: Arc<SequentialMockProvider>) -> ChatService {
        let store = Arc::new(store);
        let timeout = Duration::from_secs(1);
        ChatService::new(
            ConfigResolver::new(store.clone(), timeout),
            HistoryAdapter::new(store.clone(), 6, timeout),
            ProfileAdapter::new(store, timeout),
            Arc::new(FixedFactory(provider)),
            ToolSetBuilder::new(
                Arc::new(WordEmbedder),
                Arc::new(SharedIndexFactory::new(index)),
                None,
                RetrievalConfig::default(),
            ),
            settings(),
        )
    }

    fn keyed_store() -> InMemoryStore {
        InMemoryStore::with_settings([(keys::GROQ_API_KEY, "gsk_test")])
    }

    fn request(query: &str) -> ChatRequest {
        ChatRequest {
            query: query.into(),
            session_id: "s1".into(),
            user_id: "alice".into(),
            model_name: "llama-3.3-70b-versatile".into(),
            use_web: false,
        }
    }

    #[tokio::test]
    async fn identity_question_answered_without_tools() {
        let store = keyed_store();
        store.put_profile("alice", "Alice Smith").await.unwrap();
        let provider = Arc::new(SequentialMockProvider::single_text("Your name is Alice Smith."));
        let svc = service(store, Arc::new(InMemoryVectorIndex::new()), provider.clone());

        let response = svc
            .handle(&request("What is my name?"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.response, "Your name is Alice Smith.");
        assert_eq!(provider.call_count(), 1);
        let system = &provider.requests()[0].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("- User's Name: Alice Smith"));
        assert!(system.content.contains("Web search is NOT available"));
    }

    #[tokio::test]
    async fn unknown_profile_uses_placeholder_and_history_is_fed() {
        let store = keyed_store();
        store.append_turn("s1", ConversationTurn::user("earlier question")).await.unwrap();
        store.append_turn("s1", ConversationTurn::assistant("earlier answer")).await.unwrap();
        let provider = Arc::new(SequentialMockProvider::single_text("Hello User"));
        let svc = service(store, Arc::new(InMemoryVectorIndex::new()), provider.clone());

        svc.handle(&request("hi"), &CancellationToken::new()).await.unwrap();

        let messages = &provider.requests()[0].messages;
        assert!(messages[0].content.contains("- User's Name: User"));
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].content, "earlier answer");
        assert_eq!(messages[3].content, "hi");
    }

    #[tokio::test]
    async fn missing_chat_key_fails_fast() {
        let provider = Arc::new(SequentialMockProvider::single_text("unused"));
        let svc = service(InMemoryStore::new(), Arc::new(InMemoryVectorIndex::new()), provider.clone());

        let err = svc
            .handle(&request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
        assert!(err.to_string().starts_with("API Keys not configured"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_model_is_invalid() {
        let provider = Arc::new(SequentialMockProvider::single_text("unused"));
        let svc = service(keyed_store(), Arc::new(InMemoryVectorIndex::new()), provider);
        let mut req = request("hi");
        req.model_name = "  ".into();

        let err = svc.handle(&req, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidModel(_)));
    }

    struct BrokenFactory;

    impl ProviderFactory for BrokenFactory {
        fn build(&self, _: &SecretSet, _: &str) -> docmind_core::Result<Arc<dyn Provider>> {
            Err(ProviderError::Network("tls handshake failed".into()).into())
        }
    }

    #[tokio::test]
    async fn setup_failure_is_not_reported_as_missing_keys() {
        let store = Arc::new(keyed_store());
        let timeout = Duration::from_secs(1);
        let svc = ChatService::new(
            ConfigResolver::new(store.clone(), timeout),
            HistoryAdapter::new(store.clone(), 6, timeout),
            ProfileAdapter::new(store, timeout),
            Arc::new(BrokenFactory),
            ToolSetBuilder::new(
                Arc::new(WordEmbedder),
                Arc::new(SharedIndexFactory::new(Arc::new(InMemoryVectorIndex::new()))),
                None,
                RetrievalConfig::default(),
            ),
            settings(),
        );

        let err = svc
            .handle(&request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Setup(_)), "{err:?}");
        assert!(!err.to_string().contains("API Keys"));
        assert!(err.to_string().contains("tls handshake failed"));
    }

    #[test]
    fn only_missing_settings_map_to_configuration() {
        assert!(matches!(
            ChatError::from_setup(Error::config("GROQ_API_KEY is not set")),
            ChatError::Configuration(_)
        ));
        assert!(matches!(
            ChatError::from_setup(ProviderError::NotConfigured("groq".into()).into()),
            ChatError::Configuration(_)
        ));
        assert!(matches!(
            ChatError::from_setup(MemoryError::Index("collection schema mismatch".into()).into()),
            ChatError::Setup(_)
        ));
        assert!(matches!(
            ChatError::from_setup(ProviderError::AuthenticationFailed("bad key".into()).into()),
            ChatError::Setup(_)
        ));
    }

    #[tokio::test]
    async fn provider_failure_becomes_text() {
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let svc = service(keyed_store(), Arc::new(InMemoryVectorIndex::new()), provider);

        let response = svc
            .handle(&request("hi"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.response, "AI Error: Authentication failed: bad key");
    }

    #[tokio::test]
    async fn document_question_runs_retrieval_for_the_tenant() {
        let index = Arc::new(InMemoryVectorIndex::new());
        for (owner, text) in [("alice", "The transformer relies on attention."), ("bob", "Bob's transformer notes.")] {
            index
                .insert(vec![IndexedPassage {
                    text: text.into(),
                    source: format!("{owner}.pdf"),
                    owner: owner.into(),
                    vector: WordEmbedder.embed_one(text).await.unwrap(),
                }])
                .await
                .unwrap();
        }
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("search_internal_documents", json!({"query": "transformer"}))],
                "",
            ),
            // Query expansion reply.
            make_text_response("attention, encoder"),
            make_text_response("It relies on attention."),
        ]));
        let svc = service(keyed_store(), index, provider.clone());

        let response = svc
            .handle(&request("How does the transformer work?"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.response, "It relies on attention.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        let tool_message = requests[2].messages.last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert!(tool_message.content.contains("[alice.pdf] The transformer relies on attention."));
        assert!(!tool_message.content.contains("bob.pdf"));
    }

    #[tokio::test]
    async fn cancelled_request_returns_promptly() {
        let provider = Arc::new(SequentialMockProvider::single_text("unused"));
        let svc = service(keyed_store(), Arc::new(InMemoryVectorIndex::new()), provider.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = svc.handle(&request("hi"), &cancel).await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
        assert_eq!(provider.call_count(), 0);
    }
}
