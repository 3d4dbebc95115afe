pub mod mocks;

use mocks::{FakeContentApi, FaultyStore, ScriptedTransport};
use selah_lib::infrastructure::content::{TranslationCatalog, TranslationInfo};
use selah_lib::infrastructure::database::ConnectionPool;
use selah_lib::infrastructure::storage::SqliteLocalStore;
use selah_lib::{AppConfig, AppState, StatePorts};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_BIBLE: &str = "test-bible";

pub struct TestContext {
    pub state: AppState,
    pub api: Arc<FakeContentApi>,
    pub transport: Arc<ScriptedTransport>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.database.max_connections = 1;
    config.content.chapter_delay_ms = 0;
    config.sync.round_trip_ms = 0;
    config.sync.reconnect_delay_ms = 10;
    config.sync.backoff_base_ms = 0;
    config.sync.backoff_max_ms = 0;
    config
}

pub fn test_catalog() -> TranslationCatalog {
    TranslationCatalog::new(vec![TranslationInfo::new(
        TEST_BIBLE,
        "TST",
        "Test Bible",
        "eng",
    )])
}

#[allow(dead_code)]
pub async fn setup() -> TestContext {
    setup_with(test_config(), FakeContentApi::sample()).await
}

pub async fn setup_with(config: AppConfig, api: FakeContentApi) -> TestContext {
    let pool = ConnectionPool::from_memory()
        .await
        .expect("in-memory sqlite");
    build_context(config, pool, api)
}

pub fn build_context(config: AppConfig, pool: ConnectionPool, api: FakeContentApi) -> TestContext {
    let api = Arc::new(api);
    let transport = Arc::new(ScriptedTransport::default());
    let ports = StatePorts {
        content_api: api.clone(),
        transport: transport.clone(),
        catalog: test_catalog(),
    };
    TestContext {
        state: AppState::from_parts(config, pool, ports),
        api,
        transport,
    }
}

/// 書き込みに障害を注入できるストアで組み立てる
#[allow(dead_code)]
pub async fn setup_with_faulty_store(config: AppConfig) -> (TestContext, Arc<FaultyStore>) {
    let pool = ConnectionPool::from_memory()
        .await
        .expect("in-memory sqlite");
    let store = Arc::new(FaultyStore::new(Arc::new(SqliteLocalStore::new(
        pool.get_pool().clone(),
    ))));
    let api = Arc::new(FakeContentApi::sample());
    let transport = Arc::new(ScriptedTransport::default());
    let ports = StatePorts {
        content_api: api.clone(),
        transport: transport.clone(),
        catalog: test_catalog(),
    };
    let ctx = TestContext {
        state: AppState::with_store(config, pool, store.clone(), ports),
        api,
        transport,
    };
    (ctx, store)
}

/// 条件が満たされるまで待つ。タイムアウトしたら false
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
