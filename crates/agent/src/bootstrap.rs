//! Process-start wiring.
//!
//! The embedder, the index factory and the web-search backend are built once
//! here and shared read-only by every request.

use std::sync::Arc;
use std::time::Duration;

use docmind_config::{AppConfig, EmbeddingBackend, StoreBackend, VectorBackend};
use docmind_core::provider::ProviderFactory;
use docmind_core::retrieval::{Embedder, IndexFactory};
use docmind_core::store::MetadataStore;
use docmind_core::web::WebSearchBackend;
use docmind_memory::{
    ConfigResolver, HistoryAdapter, InMemoryStore, InMemoryVectorIndex, ProfileAdapter,
    SharedIndexFactory, SqliteStore, TypesenseIndexFactory,
};
use docmind_providers::{HashingEmbedder, OpenAiCompatFactory, RemoteEmbedder};
use docmind_tools::{ToolSetBuilder, init_web_search};
use tracing::info;

use crate::ingest::Ingestor;
use crate::orchestrator::{ChatService, ChatSettings};

/// Everything a surface (HTTP or CLI) needs.
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<ChatService>,
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<dyn MetadataStore>,
}

impl Services {
    /// Build from configuration: open the metadata store, pick the embedding
    /// and index backends, and check web search availability.
    pub async fn from_config(config: &AppConfig) -> docmind_core::Result<Self> {
        let embedder: Arc<dyn Embedder> = match config.embedding.backend {
            EmbeddingBackend::Remote => Arc::new(RemoteEmbedder::from_config(&config.embedding)?),
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embedding.hashing_dims)),
        };

        let index_factory: Arc<dyn IndexFactory> = match config.vector.backend {
            VectorBackend::Typesense => Arc::new(TypesenseIndexFactory::new(config.vector.clone())),
            VectorBackend::Memory => Arc::new(SharedIndexFactory::new(Arc::new(InMemoryVectorIndex::new()))),
        };

        let web_search = init_web_search(&config.web_search);
        let providers = Arc::new(OpenAiCompatFactory::from_config(&config.llm));

        info!(
            store = ?config.store.backend,
            embedding = ?config.embedding.backend,
            vector = ?config.vector.backend,
            web_search = web_search.is_some(),
            "Initializing services"
        );

        match config.store.backend {
            StoreBackend::Sqlite => {
                let path = &config.store.sqlite_path;
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            docmind_core::Error::config(format!(
                                "cannot create store directory {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                }
                let store = Arc::new(SqliteStore::new(path).await?);
                Ok(Self::assemble(config, store, embedder, index_factory, web_search, providers))
            }
            StoreBackend::Memory => Ok(Self::assemble(
                config,
                Arc::new(InMemoryStore::new()),
                embedder,
                index_factory,
                web_search,
                providers,
            )),
        }
    }

    /// Wire explicit parts together.
    pub fn assemble<S: MetadataStore + 'static>(
        config: &AppConfig,
        store: Arc<S>,
        embedder: Arc<dyn Embedder>,
        index_factory: Arc<dyn IndexFactory>,
        web_search: Option<Arc<dyn WebSearchBackend>>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        let store_timeout = Duration::from_secs(config.store.timeout_secs);
        let resolver = ConfigResolver::new(store.clone(), store_timeout);

        let chat = ChatService::new(
            resolver.clone(),
            HistoryAdapter::new(store.clone(), config.agent.history_limit, store_timeout),
            ProfileAdapter::new(store.clone(), store_timeout),
            providers,
            ToolSetBuilder::new(
                embedder.clone(),
                index_factory.clone(),
                web_search,
                config.retrieval.clone(),
            ),
            ChatSettings {
                assistant_name: config.assistant_name.clone(),
                temperature: config.temperature,
                agent: config.agent.clone(),
                model_timeout: Duration::from_secs(config.llm.timeout_secs),
            },
        );

        let ingestor = Ingestor::new(embedder, index_factory, resolver, &config.ingest);

        Self {
            chat: Arc::new(chat),
            ingestor: Arc::new(ingestor),
            store,
        }
    }
}
