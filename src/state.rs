use crate::application::ports::{BibleContentApi, LocalStore, SyncTransport};
use crate::application::services::{
    AnalyticsLog, AnnotationStore, ConnectivityMonitor, ContentCache, SyncOrchestrator, SyncQueue,
};
use crate::application::shared::TypedStore;
use crate::domain::value_objects::RetryPolicy;
use crate::infrastructure::content::{HttpBibleContentApi, TranslationCatalog};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::storage::SqliteLocalStore;
use crate::infrastructure::sync::{ReconcileJob, SimulatedSyncTransport};
use crate::shared::config::AppConfig;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;

/// 外部と接する部分。テストでは差し替える
pub struct StatePorts {
    pub content_api: Arc<dyn BibleContentApi>,
    pub transport: Arc<dyn SyncTransport>,
    pub catalog: TranslationCatalog,
}

impl StatePorts {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            content_api: Arc::new(HttpBibleContentApi::from_config(&config.content)?),
            transport: Arc::new(SimulatedSyncTransport::new(config.sync.round_trip())),
            catalog: TranslationCatalog::default(),
        })
    }
}

/// アプリケーション全体の状態
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: ConnectionPool,
    pub store: TypedStore,
    pub analytics: AnalyticsLog,
    pub sync_queue: Arc<SyncQueue>,
    pub annotations: Arc<AnnotationStore>,
    pub content: Arc<ContentCache>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub reconcile: Arc<ReconcileJob>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(|err| anyhow!(err))?;

        if !config.database.url.contains(":memory:") {
            std::fs::create_dir_all(&config.storage.data_dir)?;
        }
        let pool = ConnectionPool::from_config(&config.database).await?;
        let ports = StatePorts::from_config(&config)?;

        tracing::info!(
            target: "offline::state",
            database = %config.database.url,
            content_api = %config.content.api_base_url,
            "application state initialized"
        );
        Ok(Self::from_parts(config, pool, ports))
    }

    pub fn from_parts(config: AppConfig, pool: ConnectionPool, ports: StatePorts) -> Self {
        let store = Arc::new(SqliteLocalStore::new(pool.get_pool().clone()));
        Self::with_store(config, pool, store, ports)
    }

    /// ストア実装を外から渡す
    pub fn with_store(
        config: AppConfig,
        pool: ConnectionPool,
        store: Arc<dyn LocalStore>,
        ports: StatePorts,
    ) -> Self {
        let store = TypedStore::new(store);
        let analytics = AnalyticsLog::new(store.clone());

        let policy = RetryPolicy::new(
            config.sync.max_attempts,
            config.sync.backoff_base_ms,
            config.sync.backoff_max_ms,
        );
        let sync_queue = Arc::new(SyncQueue::new(store.clone(), policy));
        let annotations = Arc::new(AnnotationStore::with_sync_queue(
            store.clone(),
            Arc::clone(&sync_queue),
        ));

        let content = Arc::new(ContentCache::new(
            store.clone(),
            ports.content_api,
            ports.catalog,
            Duration::from_millis(config.content.chapter_delay_ms),
            config.content.read_cache_chapters,
        ));

        let connectivity = Arc::new(ConnectivityMonitor::new(
            config.connectivity.start_online,
            analytics.clone(),
            config.sync.reconnect_delay(),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::clone(&sync_queue),
            Arc::clone(&annotations),
            ports.transport,
            analytics.clone(),
            connectivity.subscribe(),
            config.sync.lease_ttl(),
        ));
        let reconcile = ReconcileJob::create(
            store.clone(),
            Arc::clone(&annotations),
            Arc::clone(&sync_queue),
        );

        Self {
            config: Arc::new(config),
            pool,
            store,
            analytics,
            sync_queue,
            annotations,
            content,
            connectivity,
            orchestrator,
            reconcile,
        }
    }
}
