//! Application state wiring all services together.
//!
//! The lifecycle services are generic over the store traits; `AppState` pins
//! them to either the SQLite stores (the default, persisted in the data
//! directory) or the in-memory stores (`--ephemeral`).

use std::path::PathBuf;
use std::sync::Arc;

use innerworld_core::cache::ContextCacheManager;
use innerworld_core::health::HealthChecker;
use innerworld_core::llm::BoxGenerationService;
use innerworld_core::persona::PersonaCatalog;
use innerworld_core::pipeline::ConversationPipeline;
use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_core::resilience::Resilience;
use innerworld_core::safety::{KeywordSafetyClassifier, SafetyClassifier};
use innerworld_core::session::SessionEndProcessor;
use innerworld_infra::config::{load_config, resolve_api_key, resolve_data_dir};
use innerworld_infra::llm::create_generation_service;
use innerworld_infra::memory::{InMemoryContextCache, InMemoryGraphStore, InMemoryMessageStore};
use innerworld_infra::sqlite::{
    DatabasePool, SqliteContextCache, SqliteGraphStore, SqliteMessageStore,
};
use innerworld_types::config::LifecycleConfig;

/// The lifecycle services over one set of stores.
pub struct Services<M: MessageStore, C: ContextCacheStore, G: GraphStore> {
    pub context: Arc<ContextCacheManager<C, G>>,
    pub pipeline: ConversationPipeline<M, C, G>,
    pub processor: SessionEndProcessor<M, C, G>,
    pub health: HealthChecker<M, C, G>,
    pub personas: Arc<PersonaCatalog>,
    pub resilience: Arc<Resilience>,
}

impl<M: MessageStore, C: ContextCacheStore, G: GraphStore> Services<M, C, G> {
    /// Wire the cache manager, pipeline and processor around shared stores,
    /// one generation backend and one resilience layer.
    pub fn wire(
        messages: Arc<M>,
        cache: Arc<C>,
        graph: Arc<G>,
        generator: BoxGenerationService,
        config: &LifecycleConfig,
    ) -> Self {
        let resilience = Arc::new(Resilience::new(config.retry.clone(), config.breaker.clone()));
        let generator = Arc::new(generator);
        let personas = Arc::new(PersonaCatalog::with_overrides(&config.personas));
        let safety: Arc<dyn SafetyClassifier> = Arc::new(KeywordSafetyClassifier::default());

        let health = HealthChecker::new(
            Arc::clone(&messages),
            Arc::clone(&cache),
            Arc::clone(&graph),
            Arc::clone(&resilience),
        );

        let context = Arc::new(ContextCacheManager::new(
            cache,
            Arc::clone(&graph),
            Arc::clone(&resilience),
            config.cache.ttl(),
        ));

        let pipeline = ConversationPipeline::new(
            Arc::clone(&messages),
            Arc::clone(&context),
            Arc::clone(&generator),
            safety,
            Arc::clone(&personas),
            Arc::clone(&resilience),
            config,
        );

        let processor = SessionEndProcessor::new(
            messages,
            graph,
            Arc::clone(&context),
            generator,
            Arc::clone(&resilience),
            config,
        );

        Self {
            context,
            pipeline,
            processor,
            health,
            personas,
            resilience,
        }
    }
}

pub type SqliteServices = Services<SqliteMessageStore, SqliteContextCache, SqliteGraphStore>;

pub type MemoryServices = Services<InMemoryMessageStore, InMemoryContextCache, InMemoryGraphStore>;

/// Which stores back this process.
pub enum Backend {
    Sqlite(SqliteServices),
    Memory(MemoryServices),
}

/// Shared application state for CLI commands.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: LifecycleConfig,
    pub generator_name: String,
    pub backend: Backend,
}

impl AppState {
    /// Load config, open the stores, and wire services.
    pub async fn init(ephemeral: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;

        let api_key = resolve_api_key(&config.provider);
        let generator = create_generation_service(&config.provider, api_key.as_ref());
        let generator_name = generator.name().to_string();

        let backend = if ephemeral {
            tracing::info!("using in-memory stores");
            Backend::Memory(Services::wire(
                Arc::new(InMemoryMessageStore::new()),
                Arc::new(InMemoryContextCache::new()),
                Arc::new(InMemoryGraphStore::new()),
                generator,
                &config,
            ))
        } else {
            let pool = DatabasePool::open_in(&data_dir).await?;
            Backend::Sqlite(Services::wire(
                Arc::new(SqliteMessageStore::new(pool.clone())),
                Arc::new(SqliteContextCache::new(pool.clone())),
                Arc::new(SqliteGraphStore::new(pool)),
                generator,
                &config,
            ))
        };

        Ok(Self {
            data_dir,
            config,
            generator_name,
            backend,
        })
    }
}
