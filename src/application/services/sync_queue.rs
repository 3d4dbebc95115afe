use crate::application::ports::local_store::StoreWrite;
use crate::application::shared::TypedStore;
use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{RetryPolicy, SyncActionType, SyncQueueStatus};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueCounts {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead_letter: u64,
}

impl SyncQueueCounts {
    pub fn outstanding(&self) -> u64 {
        self.pending + self.failed
    }
}

/// 追記専用の同期キュー。アイテムは削除せず状態だけ更新する
pub struct SyncQueue {
    store: TypedStore,
    policy: RetryPolicy,
}

impl SyncQueue {
    pub fn new(store: TypedStore, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// id を採番し、他の書き込みと一緒にコミットできる形で返す
    pub async fn prepare_append(
        &self,
        action_type: SyncActionType,
        data: Value,
    ) -> Result<(SyncQueueItem, StoreWrite), AppError> {
        let id = self.store.next_id::<SyncQueueItem>().await?;
        let item = SyncQueueItem::pending(id, action_type, data);
        let write = StoreWrite::put(&item)?;
        Ok((item, write))
    }

    pub async fn add_to_sync_queue(
        &self,
        action_type: SyncActionType,
        data: Value,
    ) -> Result<SyncQueueItem, AppError> {
        let (item, write) = self.prepare_append(action_type, data).await?;
        self.store.apply(vec![write]).await?;
        tracing::debug!(
            target: "offline::sync",
            id = item.id,
            action = %item.action_type,
            "sync queue item appended"
        );
        Ok(item)
    }

    pub async fn log_activity(&self, details: Value) -> Result<SyncQueueItem, AppError> {
        self.add_to_sync_queue(SyncActionType::LogActivity, details)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<SyncQueueItem>, AppError> {
        self.store
            .get::<SyncQueueItem>(&crate::application::shared::sync_queue_key(id))
            .await
    }

    pub async fn all_items(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        let mut items = self.store.all::<SyncQueueItem>().await?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// pending と failed を id 順で返す
    pub async fn outstanding_items(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        let mut items = self.items_with_status("pending").await?;
        items.extend(self.items_with_status("failed").await?);
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    pub async fn ready_items(&self, now: DateTime<Utc>) -> Result<Vec<SyncQueueItem>, AppError> {
        Ok(self
            .outstanding_items()
            .await?
            .into_iter()
            .filter(|item| item.status.is_ready(now))
            .collect())
    }

    pub async fn items_for_entity(&self, entity_key: &str) -> Result<Vec<SyncQueueItem>, AppError> {
        let mut items = self
            .store
            .by_index::<SyncQueueItem>("entityKey", entity_key)
            .await?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    pub async fn dead_letters(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        let mut items = self.items_with_status("dead_letter").await?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    pub async fn counts(&self) -> Result<SyncQueueCounts, AppError> {
        let mut counts = SyncQueueCounts::default();
        for item in self.store.all::<SyncQueueItem>().await? {
            match item.status {
                SyncQueueStatus::Pending => counts.pending += 1,
                SyncQueueStatus::Completed => counts.completed += 1,
                SyncQueueStatus::Failed { .. } => counts.failed += 1,
                SyncQueueStatus::DeadLetter { .. } => counts.dead_letter += 1,
            }
        }
        Ok(counts)
    }

    /// デッドレターを pending に戻す。戻した件数を返す
    pub async fn requeue_dead_letters(&self) -> Result<u64, AppError> {
        let mut writes = Vec::new();
        for mut item in self.dead_letters().await? {
            item.status = SyncQueueStatus::Pending;
            writes.push(StoreWrite::put(&item)?);
        }
        let requeued = writes.len() as u64;
        self.store.apply(writes).await?;
        if requeued > 0 {
            tracing::info!(
                target: "offline::sync",
                requeued,
                "dead-lettered sync items requeued"
            );
        }
        Ok(requeued)
    }

    pub fn completion_write(
        &self,
        item: &SyncQueueItem,
        now: DateTime<Utc>,
    ) -> Result<(SyncQueueItem, StoreWrite), AppError> {
        let completed = item.clone().complete(now);
        let write = StoreWrite::put(&completed)?;
        Ok((completed, write))
    }

    pub async fn mark_failed(
        &self,
        item: &SyncQueueItem,
        error: &str,
    ) -> Result<SyncQueueItem, AppError> {
        let mut failed = item.clone();
        failed.status = self.policy.on_failure(&item.status, error, Utc::now());
        self.store.put(&failed).await?;
        match &failed.status {
            SyncQueueStatus::DeadLetter { attempts, .. } => tracing::warn!(
                target: "offline::sync",
                id = failed.id,
                attempts,
                error,
                "sync item moved to dead letter"
            ),
            status => tracing::debug!(
                target: "offline::sync",
                id = failed.id,
                attempts = status.attempts(),
                error,
                "sync item failed, will retry"
            ),
        }
        Ok(failed)
    }

    async fn items_with_status(&self, status: &str) -> Result<Vec<SyncQueueItem>, AppError> {
        self.store.by_index::<SyncQueueItem>("status", status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::SqliteLocalStore;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn setup_queue(policy: RetryPolicy) -> SyncQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SyncQueue::new(
            TypedStore::new(Arc::new(SqliteLocalStore::new(pool))),
            policy,
        )
    }

    #[tokio::test]
    async fn appended_items_are_pending_with_increasing_ids() {
        let queue = setup_queue(RetryPolicy::default()).await;
        let first = queue
            .add_to_sync_queue(SyncActionType::CreateNote, json!({"id": "n1"}))
            .await
            .unwrap();
        let second = queue.log_activity(json!({"page": "lesson"})).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.status, SyncQueueStatus::Pending);
        assert_eq!(second.action_type, SyncActionType::LogActivity);

        let outstanding = queue.outstanding_items().await.unwrap();
        assert_eq!(
            outstanding.iter().map(|item| item.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert_eq!(queue.items_for_entity("note:n1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_back_off_then_dead_letter_and_requeue() {
        let queue = setup_queue(RetryPolicy::new(2, 60_000, 60_000)).await;
        let item = queue
            .add_to_sync_queue(SyncActionType::CreateHighlight, json!({"id": "h1"}))
            .await
            .unwrap();

        let failed = queue.mark_failed(&item, "timeout").await.unwrap();
        assert_eq!(failed.status.attempts(), 1);
        // バックオフ中は ready にならない
        assert!(queue.ready_items(Utc::now()).await.unwrap().is_empty());
        assert_eq!(queue.outstanding_items().await.unwrap().len(), 1);

        let dead = queue.mark_failed(&failed, "timeout").await.unwrap();
        assert!(matches!(dead.status, SyncQueueStatus::DeadLetter { .. }));
        assert!(queue.outstanding_items().await.unwrap().is_empty());

        let counts = queue.counts().await.unwrap();
        assert_eq!(counts.dead_letter, 1);
        assert_eq!(counts.outstanding(), 0);

        assert_eq!(queue.requeue_dead_letters().await.unwrap(), 1);
        let ready = queue.ready_items(Utc::now()).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].status, SyncQueueStatus::Pending);
    }

    #[tokio::test]
    async fn completion_write_keeps_the_item() {
        let queue = setup_queue(RetryPolicy::default()).await;
        let item = queue
            .add_to_sync_queue(SyncActionType::DeleteNote, json!({"id": "n9"}))
            .await
            .unwrap();

        let (completed, write) = queue.completion_write(&item, Utc::now()).unwrap();
        queue.store.apply(vec![write]).await.unwrap();

        let stored = queue.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored, completed);
        assert!(stored.synced_at.is_some());
        assert_eq!(queue.all_items().await.unwrap().len(), 1);
        assert_eq!(queue.counts().await.unwrap().completed, 1);
    }
}
