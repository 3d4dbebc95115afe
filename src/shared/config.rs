use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONTENT_API_URL: &str = "https://api.scripture.api.bible/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub content: ContentConfig,
    pub sync: SyncConfig,
    pub connectivity: ConnectivityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub request_timeout: u64,
    // レート制限対策のチャプター間ディレイ
    pub chapter_delay_ms: u64,
    pub read_cache_chapters: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub reconnect_delay_ms: u64,
    pub round_trip_ms: u64,
    /// 0 = 無制限リトライ
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// 送信ごとに延長する
    pub lease_ttl_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub probe_url: Option<String>,
    pub probe_interval_secs: u64,
    pub start_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database: DatabaseConfig {
                url: database_url_for(&data_dir),
                max_connections: 5,
                connection_timeout: 30,
            },
            content: ContentConfig {
                api_base_url: DEFAULT_CONTENT_API_URL.to_string(),
                api_key: None,
                request_timeout: 30,
                chapter_delay_ms: 100,
                read_cache_chapters: 64,
            },
            sync: SyncConfig::default(),
            connectivity: ConnectivityConfig {
                probe_url: None,
                probe_interval_secs: 15,
                start_online: true,
            },
            storage: StorageConfig {
                data_dir: data_dir.to_string_lossy().into_owned(),
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 2_000,
            round_trip_ms: 500,
            max_attempts: 5,
            backoff_base_ms: 1_000,
            backoff_max_ms: 300_000, // 5 minutes
            lease_ttl_ms: 300_000,
        }
    }
}

impl SyncConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn round_trip(&self) -> Duration {
        Duration::from_millis(self.round_trip_ms)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SELAH_DATA_DIR") {
            let dir = PathBuf::from(v.trim());
            cfg.database.url = database_url_for(&dir);
            cfg.storage.data_dir = dir.to_string_lossy().into_owned();
        }
        if let Ok(v) = std::env::var("SELAH_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("SELAH_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value as u32;
        }

        if let Ok(v) = std::env::var("SELAH_CONTENT_API_URL") {
            if !v.trim().is_empty() {
                cfg.content.api_base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("SELAH_CONTENT_API_KEY") {
            cfg.content.api_key = Some(v.trim().to_string()).filter(|key| !key.is_empty());
        }
        if let Some(value) = env_u64("SELAH_CONTENT_CHAPTER_DELAY_MS") {
            cfg.content.chapter_delay_ms = value;
        }
        if let Some(value) = env_u64("SELAH_CONTENT_REQUEST_TIMEOUT_SECS") {
            cfg.content.request_timeout = value.max(1);
        }

        if let Some(value) = env_u64("SELAH_SYNC_RECONNECT_DELAY_MS") {
            cfg.sync.reconnect_delay_ms = value;
        }
        if let Some(value) = env_u64("SELAH_SYNC_ROUND_TRIP_MS") {
            cfg.sync.round_trip_ms = value;
        }
        if let Some(value) = env_u64("SELAH_SYNC_MAX_ATTEMPTS") {
            cfg.sync.max_attempts = value as u32;
        }
        if let Some(value) = env_u64("SELAH_SYNC_BACKOFF_BASE_MS") {
            cfg.sync.backoff_base_ms = value;
        }
        if let Some(value) = env_u64("SELAH_SYNC_BACKOFF_MAX_MS") {
            cfg.sync.backoff_max_ms = value;
        }
        if let Some(value) = env_u64("SELAH_SYNC_LEASE_TTL_MS") {
            cfg.sync.lease_ttl_ms = value;
        }

        if let Ok(v) = std::env::var("SELAH_CONNECTIVITY_PROBE_URL") {
            cfg.connectivity.probe_url = Some(v.trim().to_string()).filter(|url| !url.is_empty());
        }
        if let Some(value) = env_u64("SELAH_CONNECTIVITY_PROBE_INTERVAL_SECS") {
            cfg.connectivity.probe_interval_secs = value.max(1);
        }
        if let Ok(v) = std::env::var("SELAH_START_ONLINE") {
            cfg.connectivity.start_online = parse_bool(&v, cfg.connectivity.start_online);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if !self.content.api_base_url.starts_with("http://")
            && !self.content.api_base_url.starts_with("https://")
        {
            return Err("Content api_base_url must be an http(s) URL".to_string());
        }
        if self.content.read_cache_chapters == 0 {
            return Err("Content read_cache_chapters must be greater than 0".to_string());
        }
        if self.sync.backoff_base_ms > self.sync.backoff_max_ms {
            return Err("Sync backoff_base_ms must not exceed backoff_max_ms".to_string());
        }
        if self.sync.lease_ttl_ms == 0 {
            return Err("Sync lease_ttl_ms must be greater than 0".to_string());
        }
        if self.connectivity.probe_interval_secs == 0 {
            return Err("Connectivity probe_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// プローブ先が未指定ならコンテンツAPIを使う
    pub fn probe_url(&self) -> &str {
        self.connectivity
            .probe_url
            .as_deref()
            .unwrap_or(&self.content.api_base_url)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("selah"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn database_url_for(data_dir: &std::path::Path) -> String {
    format!("sqlite:{}?mode=rwc", data_dir.join("selah.db").to_string_lossy())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
