use super::analytics::{AnalyticsLog, SYNC_COMPLETED, SYNC_FAILED, SYNC_STARTED};
use super::annotation_service::AnnotationStore;
use super::sync_queue::{SyncQueue, SyncQueueCounts};
use crate::application::ports::sync_transport::SyncTransport;
use crate::application::shared::TypedStore;
use crate::domain::entities::{MetadataEntry, SyncQueueItem};
use crate::domain::value_objects::SyncCategory;
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

pub const SYNC_LEASE: &str = "sync_queue";
pub const LAST_SYNC_KEY: &str = "last_sync_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
    /// 別プロセスが同期中
    LeaseHeld,
    NothingPending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub completed: u32,
    pub failed: u32,
    pub deferred: u32,
    pub notes: u32,
    pub highlights: u32,
    pub activities: u32,
    pub completed_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Finished(SyncReport),
}

impl SyncOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Finished(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub queue: SyncQueueCounts,
    pub last_sync: Option<DateTime<Utc>>,
}

/// 同期キューを送信し、エンティティの synced フラグを確定させる
pub struct SyncOrchestrator {
    store: TypedStore,
    queue: Arc<SyncQueue>,
    annotations: Arc<AnnotationStore>,
    transport: Arc<dyn SyncTransport>,
    analytics: AnalyticsLog,
    online: watch::Receiver<bool>,
    gate: Mutex<()>,
    owner: String,
    lease_ttl: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        store: TypedStore,
        queue: Arc<SyncQueue>,
        annotations: Arc<AnnotationStore>,
        transport: Arc<dyn SyncTransport>,
        analytics: AnalyticsLog,
        online: watch::Receiver<bool>,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            annotations,
            transport,
            analytics,
            online,
            gate: Mutex::new(()),
            owner: Uuid::new_v4().to_string(),
            lease_ttl,
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    pub async fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let Some(entry) = self.store.get::<MetadataEntry>(LAST_SYNC_KEY).await? else {
            return Ok(None);
        };
        let timestamp = serde_json::from_value(entry.value)
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;
        Ok(Some(timestamp))
    }

    pub async fn status(&self) -> Result<SyncStatus, AppError> {
        let is_online = *self.online.borrow();
        Ok(SyncStatus {
            is_online,
            is_syncing: self.is_syncing(),
            queue: self.queue.counts().await?,
            last_sync: self.last_synced_at().await?,
        })
    }

    /// オフライン中・同期中・対象なしのときは何もせずに返る
    pub async fn sync_pending_changes(&self) -> Result<SyncOutcome, AppError> {
        if !*self.online.borrow() {
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        let Ok(_guard) = self.gate.try_lock() else {
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };
        if !self
            .store
            .raw()
            .try_acquire_lease(SYNC_LEASE, &self.owner, self.lease_ttl)
            .await?
        {
            tracing::debug!(target: "offline::sync", "sync lease held by another process");
            return Ok(SyncOutcome::Skipped(SkipReason::LeaseHeld));
        }

        let result = self.run_locked().await;

        if let Err(err) = self.store.raw().release_lease(SYNC_LEASE, &self.owner).await {
            tracing::warn!(
                target: "offline::sync",
                error = %err,
                "failed to release sync lease"
            );
        }
        result
    }

    async fn run_locked(&self) -> Result<SyncOutcome, AppError> {
        let outstanding = self.queue.outstanding_items().await?;
        let now = Utc::now();
        let ready = outstanding
            .iter()
            .filter(|item| item.status.is_ready(now))
            .count();
        if ready == 0 {
            return Ok(SyncOutcome::Skipped(SkipReason::NothingPending));
        }

        self.analytics
            .record(
                SYNC_STARTED,
                json!({"pending": ready, "outstanding": outstanding.len()}),
            )
            .await;
        tracing::info!(target: "offline::sync", pending = ready, "sync started");

        let mut report = SyncReport::default();
        let result = match self.process(outstanding, now, &mut report).await {
            Ok(()) => self.persist_last_sync().await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                let properties = json!({
                    "completed": report.completed,
                    "failed": report.failed,
                    "deferred": report.deferred,
                    "notes": report.notes,
                    "highlights": report.highlights,
                    "activities": report.activities,
                });
                if report.failed > 0 {
                    self.analytics.record(SYNC_FAILED, properties).await;
                    tracing::warn!(
                        target: "offline::sync",
                        completed = report.completed,
                        failed = report.failed,
                        "sync finished with failures"
                    );
                } else {
                    self.analytics.record(SYNC_COMPLETED, properties).await;
                    tracing::info!(
                        target: "offline::sync",
                        completed = report.completed,
                        deferred = report.deferred,
                        "sync completed"
                    );
                }
                Ok(SyncOutcome::Finished(report))
            }
            Err(err) => {
                // 完了済みのアイテムは完了のまま残す
                self.analytics
                    .record(
                        SYNC_FAILED,
                        json!({"error": err.to_string(), "completed": report.completed}),
                    )
                    .await;
                tracing::error!(
                    target: "offline::sync",
                    error = %err,
                    completed = report.completed,
                    "sync aborted"
                );
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        items: Vec<SyncQueueItem>,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        // 先行アイテムが未完了のエンティティ
        let mut blocked: HashSet<String> = HashSet::new();

        for item in items {
            let entity_key = item.entity_key();
            if !item.status.is_ready(now) {
                if let Some(key) = entity_key {
                    blocked.insert(key);
                }
                continue;
            }
            if entity_key
                .as_ref()
                .is_some_and(|key| blocked.contains(key))
            {
                report.deferred += 1;
                continue;
            }
            if !*self.online.borrow() {
                report.deferred += 1;
                continue;
            }
            self.renew_lease().await?;

            match self.transport.push(&item).await {
                Ok(()) => {
                    self.complete(&item).await?;
                    report.completed += 1;
                    report.completed_ids.push(item.id);
                    match item.action_type.category() {
                        SyncCategory::Note => report.notes += 1,
                        SyncCategory::Highlight => report.highlights += 1,
                        SyncCategory::Activity => report.activities += 1,
                    }
                }
                Err(err) => {
                    self.queue.mark_failed(&item, &err.to_string()).await?;
                    report.failed += 1;
                    if let Some(key) = entity_key {
                        blocked.insert(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// キューアイテムの完了とエンティティの synced 更新を同じバッチで書く
    async fn complete(&self, item: &SyncQueueItem) -> Result<(), AppError> {
        let (_, queue_write) = self.queue.completion_write(item, Utc::now())?;
        let mut writes = vec![queue_write];

        if let (Some(id), Some(key)) = (item.entity_id(), item.entity_key()) {
            if !item.action_type.is_delete() {
                // キュー確認より先に読む。この後の保存は updatedAt の不一致で弾かれる
                let synced = self
                    .annotations
                    .synced_write(item.action_type.category(), id)
                    .await?;
                let still_outstanding = self
                    .queue
                    .items_for_entity(&key)
                    .await?
                    .iter()
                    .any(|other| other.id != item.id && other.status.is_outstanding());
                if let Some(write) = synced.filter(|_| !still_outstanding) {
                    writes.push(write);
                }
            }
        }

        let skipped = self.store.apply_checked(writes).await?;
        if skipped > 0 {
            tracing::debug!(
                target: "offline::sync",
                id = item.id,
                "entity edited during sync, left unsynced"
            );
        }
        Ok(())
    }

    /// 送信ごとにリースを延長する。他プロセスに奪われていたら中断する
    async fn renew_lease(&self) -> Result<(), AppError> {
        let held = self
            .store
            .raw()
            .try_acquire_lease(SYNC_LEASE, &self.owner, self.lease_ttl)
            .await?;
        if held {
            Ok(())
        } else {
            tracing::warn!(target: "offline::sync", "sync lease taken over by another process");
            Err(AppError::Storage(
                "sync lease lost to another process".to_string(),
            ))
        }
    }

    async fn persist_last_sync(&self) -> Result<(), AppError> {
        let now = Utc::now();
        self.store
            .put(&MetadataEntry {
                key: LAST_SYNC_KEY.to_string(),
                value: serde_json::to_value(now)?,
                updated_at: now,
            })
            .await
    }
}
