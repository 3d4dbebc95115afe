use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// ローカルストアの名前付きパーティション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Translations,
    Books,
    Chapters,
    Verses,
    Notes,
    Highlights,
    SyncQueue,
    DownloadProgress,
    AnalyticsEvents,
    Metadata,
}

impl Partition {
    pub const ALL: [Partition; 10] = [
        Partition::Translations,
        Partition::Books,
        Partition::Chapters,
        Partition::Verses,
        Partition::Notes,
        Partition::Highlights,
        Partition::SyncQueue,
        Partition::DownloadProgress,
        Partition::AnalyticsEvents,
        Partition::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Translations => "translations",
            Partition::Books => "books",
            Partition::Chapters => "chapters",
            Partition::Verses => "verses",
            Partition::Notes => "notes",
            Partition::Highlights => "highlights",
            Partition::SyncQueue => "sync_queue",
            Partition::DownloadProgress => "download_progress",
            Partition::AnalyticsEvents => "analytics_events",
            Partition::Metadata => "metadata",
        }
    }

    /// パーティションごとに宣言されたセカンダリインデックス
    pub fn indexes(&self) -> &'static [&'static str] {
        match self {
            Partition::Translations => &["language", "downloaded"],
            Partition::Books => &["translationId"],
            Partition::Chapters => &["translationId", "bookKey"],
            Partition::Verses => &["translationId", "chapterKey", "reference"],
            Partition::Notes => &["reference", "synced"],
            Partition::Highlights => &["reference", "synced"],
            Partition::SyncQueue => &["status", "entityKey"],
            Partition::DownloadProgress => &["status"],
            Partition::AnalyticsEvents => &["name"],
            Partition::Metadata => &[],
        }
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes().contains(&index)
    }

    pub fn ensure_index(&self, index: &str) -> Result<(), AppError> {
        if self.has_index(index) {
            Ok(())
        } else {
            Err(AppError::InvalidInput(format!(
                "Partition '{}' has no index '{}'",
                self.as_str(),
                index
            )))
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: &'static str,
    pub value: String,
}

impl IndexEntry {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// キー・インデックス・本体を持つ永続化単位
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub indexes: Vec<IndexEntry>,
    pub body: Value,
}

/// 1トランザクションで適用する書き込み
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Put {
        partition: Partition,
        record: StoredRecord,
    },
    Delete {
        partition: Partition,
        key: String,
    },
    DeleteByIndex {
        partition: Partition,
        index: &'static str,
        value: String,
    },
    /// 既存レコードの `field` が `expected` のままのときだけ上書きする。
    /// 判定はバッチと同じトランザクション内で行う
    PutIfUnchanged {
        partition: Partition,
        record: StoredRecord,
        field: &'static str,
        expected: Value,
    },
}

impl StoreWrite {
    pub fn put<T: Record>(record: &T) -> Result<Self, AppError> {
        Ok(StoreWrite::Put {
            partition: T::PARTITION,
            record: record.to_stored()?,
        })
    }

    pub fn delete<T: Record>(key: impl Into<String>) -> Self {
        StoreWrite::Delete {
            partition: T::PARTITION,
            key: key.into(),
        }
    }

    pub fn delete_by_index(partition: Partition, index: &'static str, value: impl Into<String>) -> Self {
        StoreWrite::DeleteByIndex {
            partition,
            index,
            value: value.into(),
        }
    }

    pub fn put_if_unchanged<T: Record>(
        record: &T,
        field: &'static str,
        expected: Value,
    ) -> Result<Self, AppError> {
        Ok(StoreWrite::PutIfUnchanged {
            partition: T::PARTITION,
            record: record.to_stored()?,
            field,
            expected,
        })
    }

    pub fn partition(&self) -> Partition {
        match self {
            StoreWrite::Put { partition, .. }
            | StoreWrite::Delete { partition, .. }
            | StoreWrite::DeleteByIndex { partition, .. }
            | StoreWrite::PutIfUnchanged { partition, .. } => *partition,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, StoreWrite::PutIfUnchanged { .. })
    }
}

/// パーティション付きレコードストアのポート
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn put(&self, partition: Partition, record: StoredRecord) -> Result<(), AppError>;
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, AppError>;
    /// 挿入順で返す
    async fn get_all(&self, partition: Partition) -> Result<Vec<Value>, AppError>;
    async fn get_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError>;
    async fn delete(&self, partition: Partition, key: &str) -> Result<bool, AppError>;
    async fn delete_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<u64, AppError>;
    async fn clear(&self, partition: Partition) -> Result<u64, AppError>;
    async fn count(&self, partition: Partition) -> Result<u64, AppError>;
    async fn next_sequence(&self, partition: Partition) -> Result<i64, AppError>;
    /// 1トランザクションで適用する。戻り値は条件が合わず見送った書き込みの件数
    async fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<u64, AppError>;
    /// プロセスをまたぐ排他用のリース。取得できたら true
    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, AppError>;
    async fn release_lease(&self, name: &str, owner: &str) -> Result<(), AppError>;
}

/// ストアに保存できるドメインレコード
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const PARTITION: Partition;

    fn key(&self) -> String;

    fn index_entries(&self) -> Vec<IndexEntry> {
        Vec::new()
    }

    fn to_stored(&self) -> Result<StoredRecord, AppError> {
        let body = serde_json::to_value(self)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        Ok(StoredRecord {
            key: self.key(),
            indexes: self.index_entries(),
            body,
        })
    }

    fn from_value(value: Value) -> Result<Self, AppError> {
        serde_json::from_value(value).map_err(|err| {
            AppError::DeserializationError(format!("{}: {}", Self::PARTITION, err))
        })
    }
}
