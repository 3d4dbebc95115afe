use crate::application::ports::local_store::{LocalStore, Partition, StoreWrite, StoredRecord};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tokio::sync::OnceCell;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite 上のパーティション付きレコードストア。
///
/// スキーマは最初の操作時に一度だけ適用される。同時に来た呼び出しは
/// 同じ初期化を待つ。
pub struct SqliteLocalStore {
    pool: SqlitePool,
    initialized: OnceCell<()>,
}

impl SqliteLocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            initialized: OnceCell::new(),
        }
    }

    async fn ready(&self) -> Result<&SqlitePool, AppError> {
        self.initialized
            .get_or_try_init(|| async {
                MIGRATOR.run(&self.pool).await?;
                tracing::debug!(target: "offline::store", "local store schema ready");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(&self.pool)
    }

    async fn put_in(
        conn: &mut SqliteConnection,
        partition: Partition,
        record: &StoredRecord,
    ) -> Result<(), AppError> {
        for entry in &record.indexes {
            partition.ensure_index(entry.name)?;
        }
        let payload = serde_json::to_string(&record.body)?;

        sqlx::query(
            r#"
            INSERT INTO store_records (partition, record_key, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(partition, record_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(partition.as_str())
        .bind(&record.key)
        .bind(&payload)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM store_index_entries
            WHERE partition = ?1 AND record_key = ?2
            "#,
        )
        .bind(partition.as_str())
        .bind(&record.key)
        .execute(&mut *conn)
        .await?;

        for entry in &record.indexes {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO store_index_entries
                    (partition, index_name, index_value, record_key)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(partition.as_str())
            .bind(entry.name)
            .bind(&entry.value)
            .bind(&record.key)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn delete_in(
        conn: &mut SqliteConnection,
        partition: Partition,
        key: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM store_records
            WHERE partition = ?1 AND record_key = ?2
            "#,
        )
        .bind(partition.as_str())
        .bind(key)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM store_index_entries
            WHERE partition = ?1 AND record_key = ?2
            "#,
        )
        .bind(partition.as_str())
        .bind(key)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_index_in(
        conn: &mut SqliteConnection,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<u64, AppError> {
        partition.ensure_index(index)?;

        let result = sqlx::query(
            r#"
            DELETE FROM store_records
            WHERE partition = ?1 AND record_key IN (
                SELECT record_key FROM store_index_entries
                WHERE partition = ?1 AND index_name = ?2 AND index_value = ?3
            )
            "#,
        )
        .bind(partition.as_str())
        .bind(index)
        .bind(value)
        .execute(&mut *conn)
        .await?;

        // 本体を失ったインデックスを掃除
        sqlx::query(
            r#"
            DELETE FROM store_index_entries
            WHERE partition = ?1 AND record_key NOT IN (
                SELECT record_key FROM store_records WHERE partition = ?1
            )
            "#,
        )
        .bind(partition.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_in(
        conn: &mut SqliteConnection,
        partition: Partition,
        key: &str,
    ) -> Result<Option<Value>, AppError> {
        let payload: Option<String> = sqlx::query_scalar(
            r#"
            SELECT payload FROM store_records
            WHERE partition = ?1 AND record_key = ?2
            "#,
        )
        .bind(partition.as_str())
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        payload
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|err| AppError::DeserializationError(format!("{partition}: {err}")))
            })
            .transpose()
    }

    fn decode_rows(rows: Vec<String>, partition: Partition) -> Result<Vec<Value>, AppError> {
        rows.into_iter()
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|err| {
                    AppError::DeserializationError(format!("{partition}: {err}"))
                })
            })
            .collect()
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn put(&self, partition: Partition, record: StoredRecord) -> Result<(), AppError> {
        let pool = self.ready().await?;
        let mut tx = pool.begin().await?;
        Self::put_in(&mut tx, partition, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, AppError> {
        let pool = self.ready().await?;
        let mut conn = pool.acquire().await?;
        Self::get_in(&mut conn, partition, key).await
    }

    async fn get_all(&self, partition: Partition) -> Result<Vec<Value>, AppError> {
        let pool = self.ready().await?;
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT payload FROM store_records
            WHERE partition = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(partition.as_str())
        .fetch_all(pool)
        .await?;

        Self::decode_rows(rows, partition)
    }

    async fn get_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        partition.ensure_index(index)?;
        let pool = self.ready().await?;
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.payload
            FROM store_records r
            JOIN store_index_entries i
              ON i.partition = r.partition AND i.record_key = r.record_key
            WHERE i.partition = ?1 AND i.index_name = ?2 AND i.index_value = ?3
            ORDER BY r.seq ASC
            "#,
        )
        .bind(partition.as_str())
        .bind(index)
        .bind(value)
        .fetch_all(pool)
        .await?;

        Self::decode_rows(rows, partition)
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<bool, AppError> {
        let pool = self.ready().await?;
        let mut tx = pool.begin().await?;
        let removed = Self::delete_in(&mut tx, partition, key).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<u64, AppError> {
        let pool = self.ready().await?;
        let mut tx = pool.begin().await?;
        let removed = Self::delete_by_index_in(&mut tx, partition, index, value).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn clear(&self, partition: Partition) -> Result<u64, AppError> {
        let pool = self.ready().await?;
        let mut tx = pool.begin().await?;
        let result = sqlx::query("DELETE FROM store_records WHERE partition = ?1")
            .bind(partition.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM store_index_entries WHERE partition = ?1")
            .bind(partition.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, partition: Partition) -> Result<u64, AppError> {
        let pool = self.ready().await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM store_records WHERE partition = ?1")
                .bind(partition.as_str())
                .fetch_one(pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn next_sequence(&self, partition: Partition) -> Result<i64, AppError> {
        let pool = self.ready().await?;
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO store_sequences (partition, value) VALUES (?1, 1)
            ON CONFLICT(partition) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(partition.as_str())
        .fetch_one(pool)
        .await?;
        Ok(value)
    }

    async fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<u64, AppError> {
        let pool = self.ready().await?;
        let mut tx = pool.begin().await?;
        let mut skipped = 0u64;
        for write in &writes {
            match write {
                StoreWrite::Put { partition, record } => {
                    Self::put_in(&mut tx, *partition, record).await?;
                }
                StoreWrite::Delete { partition, key } => {
                    Self::delete_in(&mut tx, *partition, key).await?;
                }
                StoreWrite::DeleteByIndex {
                    partition,
                    index,
                    value,
                } => {
                    Self::delete_by_index_in(&mut tx, *partition, index, value).await?;
                }
                StoreWrite::PutIfUnchanged {
                    partition,
                    record,
                    field,
                    expected,
                } => {
                    let current = Self::get_in(&mut tx, *partition, &record.key).await?;
                    let unchanged = current
                        .as_ref()
                        .and_then(|body| body.get(*field))
                        .is_some_and(|value| value == expected);
                    if unchanged {
                        Self::put_in(&mut tx, *partition, record).await?;
                    } else {
                        skipped += 1;
                        tracing::debug!(
                            target: "offline::store",
                            partition = %partition,
                            key = %record.key,
                            field,
                            "conditional write skipped, record changed"
                        );
                    }
                }
            }
        }
        tx.commit().await?;
        Ok(skipped)
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        let pool = self.ready().await?;
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        let result = sqlx::query(
            r#"
            INSERT INTO store_leases (name, owner, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                owner = excluded.owner,
                expires_at = excluded.expires_at
            WHERE store_leases.expires_at <= ?4 OR store_leases.owner = excluded.owner
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(expires_at)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lease(&self, name: &str, owner: &str) -> Result<(), AppError> {
        let pool = self.ready().await?;
        sqlx::query("DELETE FROM store_leases WHERE name = ?1 AND owner = ?2")
            .bind(name)
            .bind(owner)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::local_store::IndexEntry;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqliteLocalStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteLocalStore::new(pool)
    }

    fn record(key: &str, indexes: Vec<IndexEntry>, body: Value) -> StoredRecord {
        StoredRecord {
            key: key.to_string(),
            indexes,
            body,
        }
    }

    #[tokio::test]
    async fn put_get_and_overwrite() {
        let store = setup_store().await;

        store
            .put(
                Partition::Notes,
                record(
                    "n1",
                    vec![IndexEntry::new("reference", "John 3:16")],
                    json!({"content": "first"}),
                ),
            )
            .await
            .unwrap();
        store
            .put(
                Partition::Notes,
                record(
                    "n1",
                    vec![IndexEntry::new("reference", "John 3:17")],
                    json!({"content": "second"}),
                ),
            )
            .await
            .unwrap();

        let value = store.get(Partition::Notes, "n1").await.unwrap().unwrap();
        assert_eq!(value["content"], "second");
        assert_eq!(store.count(Partition::Notes).await.unwrap(), 1);

        // 古いインデックス値では引けない
        let old = store
            .get_by_index(Partition::Notes, "reference", "John 3:16")
            .await
            .unwrap();
        assert!(old.is_empty());
        let new = store
            .get_by_index(Partition::Notes, "reference", "John 3:17")
            .await
            .unwrap();
        assert_eq!(new.len(), 1);

        assert!(store.get(Partition::Highlights, "n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_preserves_insertion_order() {
        let store = setup_store().await;
        for key in ["c", "a", "b"] {
            store
                .put(Partition::Metadata, record(key, vec![], json!({"key": key})))
                .await
                .unwrap();
        }
        // 上書きしても順序は変わらない
        store
            .put(Partition::Metadata, record("c", vec![], json!({"key": "c2"})))
            .await
            .unwrap();

        let keys: Vec<_> = store
            .get_all(Partition::Metadata)
            .await
            .unwrap()
            .into_iter()
            .map(|value| value["key"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["c2", "a", "b"]);
    }

    #[tokio::test]
    async fn undeclared_index_is_an_error() {
        let store = setup_store().await;
        let err = store
            .get_by_index(Partition::Notes, "color", "#fff59d")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = store
            .put(
                Partition::Metadata,
                record("k", vec![IndexEntry::new("status", "x")], json!({})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_by_index_cascades_only_matching_rows() {
        let store = setup_store().await;
        for (key, translation) in [("kjv:GEN", "kjv"), ("kjv:EXO", "kjv"), ("web:GEN", "web")] {
            store
                .put(
                    Partition::Books,
                    record(
                        key,
                        vec![IndexEntry::new("translationId", translation)],
                        json!({"key": key}),
                    ),
                )
                .await
                .unwrap();
        }

        let removed = store
            .delete_by_index(Partition::Books, "translationId", "kjv")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store
            .get_by_index(Partition::Books, "translationId", "kjv")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .get_by_index(Partition::Books, "translationId", "web")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = setup_store().await;
        store
            .put(Partition::Highlights, record("h1", vec![], json!({})))
            .await
            .unwrap();
        store
            .put(Partition::Highlights, record("h2", vec![], json!({})))
            .await
            .unwrap();

        assert!(store.delete(Partition::Highlights, "h1").await.unwrap());
        assert!(!store.delete(Partition::Highlights, "h1").await.unwrap());
        assert_eq!(store.clear(Partition::Highlights).await.unwrap(), 1);
        assert_eq!(store.count(Partition::Highlights).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sequences_are_per_partition_and_monotonic() {
        let store = setup_store().await;
        assert_eq!(store.next_sequence(Partition::SyncQueue).await.unwrap(), 1);
        assert_eq!(store.next_sequence(Partition::SyncQueue).await.unwrap(), 2);
        assert_eq!(
            store.next_sequence(Partition::AnalyticsEvents).await.unwrap(),
            1
        );
        store.clear(Partition::SyncQueue).await.unwrap();
        assert_eq!(store.next_sequence(Partition::SyncQueue).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_every_write() {
        let store = setup_store().await;
        let writes = vec![
            StoreWrite::Put {
                partition: Partition::Notes,
                record: record("n1", vec![], json!({})),
            },
            StoreWrite::Put {
                partition: Partition::SyncQueue,
                record: record("q1", vec![IndexEntry::new("bogus", "x")], json!({})),
            },
        ];

        assert!(store.write_batch(writes).await.is_err());
        assert!(store.get(Partition::Notes, "n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_put_only_applies_when_field_is_unchanged() {
        let store = setup_store().await;
        store
            .put(
                Partition::Notes,
                record("n1", vec![], json!({ "rev": 1, "synced": false })),
            )
            .await
            .unwrap();

        let guarded = |expected: i64| StoreWrite::PutIfUnchanged {
            partition: Partition::Notes,
            record: record("n1", vec![], json!({ "rev": 1, "synced": true })),
            field: "rev",
            expected: json!(expected),
        };

        assert_eq!(store.write_batch(vec![guarded(0)]).await.unwrap(), 1);
        let body = store.get(Partition::Notes, "n1").await.unwrap().unwrap();
        assert_eq!(body["synced"], json!(false));

        assert_eq!(store.write_batch(vec![guarded(1)]).await.unwrap(), 0);
        let body = store.get(Partition::Notes, "n1").await.unwrap().unwrap();
        assert_eq!(body["synced"], json!(true));

        // 存在しないレコードには書かない
        let missing = StoreWrite::PutIfUnchanged {
            partition: Partition::Notes,
            record: record("n2", vec![], json!({ "rev": 1 })),
            field: "rev",
            expected: json!(1),
        };
        assert_eq!(store.write_batch(vec![missing]).await.unwrap(), 1);
        assert!(store.get(Partition::Notes, "n2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lease_excludes_other_owners_until_released() {
        let store = setup_store().await;
        let ttl = Duration::from_secs(60);

        assert!(store.try_acquire_lease("sync", "a", ttl).await.unwrap());
        assert!(!store.try_acquire_lease("sync", "b", ttl).await.unwrap());
        // 同じ所有者は延長できる
        assert!(store.try_acquire_lease("sync", "a", ttl).await.unwrap());

        store.release_lease("sync", "b").await.unwrap();
        assert!(!store.try_acquire_lease("sync", "b", ttl).await.unwrap());

        store.release_lease("sync", "a").await.unwrap();
        assert!(store.try_acquire_lease("sync", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let store = setup_store().await;
        assert!(store
            .try_acquire_lease("sync", "a", Duration::from_millis(0))
            .await
            .unwrap());
        assert!(store
            .try_acquire_lease("sync", "b", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_initialization() {
        let store = setup_store().await;
        let (a, b, c) = tokio::join!(
            store.count(Partition::Notes),
            store.get_all(Partition::Verses),
            store.next_sequence(Partition::SyncQueue)
        );
        assert_eq!(a.unwrap(), 0);
        assert!(b.unwrap().is_empty());
        assert_eq!(c.unwrap(), 1);
    }
}
