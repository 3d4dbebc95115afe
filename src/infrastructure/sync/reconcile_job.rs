use crate::application::services::{AnnotationStore, SyncQueue};
use crate::application::shared::TypedStore;
use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{SyncActionType, SyncCategory, SyncQueueStatus};
use crate::shared::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub unsynced_notes: usize,
    pub unsynced_highlights: usize,
    /// 完了済みキューに合わせて synced にしたエンティティ
    pub marked_synced: Vec<String>,
    /// キューに何も無かったため再登録したエンティティ
    pub requeued: Vec<String>,
    pub pending_queue_count: u64,
    pub emitted_at: i64,
}

enum Resolution {
    Leave,
    MarkSynced,
    Requeue,
}

/// 起動時に synced フラグとキューの食い違いを直す
pub struct ReconcileJob {
    store: TypedStore,
    annotations: Arc<AnnotationStore>,
    queue: Arc<SyncQueue>,
    gate: Mutex<()>,
}

impl ReconcileJob {
    pub fn create(
        store: TypedStore,
        annotations: Arc<AnnotationStore>,
        queue: Arc<SyncQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            annotations,
            queue,
            gate: Mutex::new(()),
        })
    }

    pub fn trigger(self: &Arc<Self>) -> JoinHandle<()> {
        let job = Arc::clone(self);
        tokio::spawn(async move {
            job.run_guarded().await;
        })
    }

    pub async fn reconcile_once(&self) -> Result<ReconcileReport, AppError> {
        let notes = self.annotations.unsynced_notes().await?;
        let highlights = self.annotations.unsynced_highlights().await?;

        let mut report = ReconcileReport {
            unsynced_notes: notes.len(),
            unsynced_highlights: highlights.len(),
            ..ReconcileReport::default()
        };

        for note in &notes {
            let payload = json!({
                "id": note.id,
                "reference": note.reference,
                "content": note.content,
            });
            self.reconcile_entity(
                SyncCategory::Note,
                &note.id,
                SyncActionType::CreateNote,
                payload,
                &mut report,
            )
            .await?;
        }

        for highlight in &highlights {
            let payload = json!({
                "id": highlight.id,
                "reference": highlight.reference,
                "color": highlight.color,
            });
            self.reconcile_entity(
                SyncCategory::Highlight,
                &highlight.id,
                SyncActionType::CreateHighlight,
                payload,
                &mut report,
            )
            .await?;
        }

        report.pending_queue_count = self.queue.counts().await?.outstanding();
        report.emitted_at = Utc::now().timestamp_millis();
        Ok(report)
    }

    async fn reconcile_entity(
        &self,
        category: SyncCategory,
        id: &str,
        action: SyncActionType,
        payload: Value,
        report: &mut ReconcileReport,
    ) -> Result<(), AppError> {
        let key = category.entity_key(id);
        // キューより先にエンティティを読む
        let synced = self.annotations.synced_write(category, id).await?;
        let items = self.queue.items_for_entity(&key).await?;

        match resolve(&items) {
            Resolution::Leave => {}
            Resolution::MarkSynced => {
                if let Some(write) = synced {
                    if self.store.apply_checked(vec![write]).await? == 0 {
                        report.marked_synced.push(key);
                    }
                }
            }
            Resolution::Requeue => {
                self.queue.add_to_sync_queue(action, payload).await?;
                report.requeued.push(key);
            }
        }
        Ok(())
    }

    async fn run_guarded(self: Arc<Self>) {
        let _guard = self.gate.lock().await;
        match self.reconcile_once().await {
            Ok(report) => tracing::info!(
                target: "offline::reconcile",
                marked_synced = report.marked_synced.len(),
                requeued = report.requeued.len(),
                pending = report.pending_queue_count,
                "reconciliation completed"
            ),
            Err(err) => tracing::error!(
                target: "offline::reconcile",
                error = %err,
                "reconciliation failed"
            ),
        }
    }
}

fn resolve(items: &[SyncQueueItem]) -> Resolution {
    if items.is_empty() {
        return Resolution::Requeue;
    }
    if items.iter().any(|item| item.status.is_outstanding()) {
        return Resolution::Leave;
    }
    // デッドレターは手動で戻すまで触らない
    if items
        .iter()
        .any(|item| matches!(item.status, SyncQueueStatus::DeadLetter { .. }))
    {
        return Resolution::Leave;
    }
    Resolution::MarkSynced
}
