use super::sync_queue::SyncQueue;
use crate::application::ports::local_store::StoreWrite;
use crate::application::shared::TypedStore;
use crate::domain::entities::{Highlight, HighlightDraft, Note, NoteDraft};
use crate::domain::value_objects::{SyncActionType, SyncCategory};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// ノートとハイライトの保存先。
///
/// 同期キューを渡した場合、エンティティの書き込みとキューへの追記は
/// 同じバッチでコミットされる。
pub struct AnnotationStore {
    store: TypedStore,
    sync_queue: Option<Arc<SyncQueue>>,
}

impl AnnotationStore {
    pub fn new(store: TypedStore) -> Self {
        Self {
            store,
            sync_queue: None,
        }
    }

    pub fn with_sync_queue(store: TypedStore, sync_queue: Arc<SyncQueue>) -> Self {
        Self {
            store,
            sync_queue: Some(sync_queue),
        }
    }

    pub async fn save_note(&self, draft: NoteDraft) -> Result<Note, AppError> {
        let reference = require_reference(&draft.reference)?;
        if draft.content.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Note content must not be empty".to_string(),
            ));
        }

        let existing = match &draft.id {
            Some(id) => self.store.get::<Note>(id).await?,
            None => None,
        };
        let now = Utc::now();
        let note = Note {
            id: draft.id.unwrap_or_else(new_id),
            reference,
            content: draft.content,
            created_at: existing.as_ref().map(|note| note.created_at).unwrap_or(now),
            updated_at: now,
            synced: false,
        };

        let action = if existing.is_some() {
            SyncActionType::UpdateNote
        } else {
            SyncActionType::CreateNote
        };
        let payload = json!({
            "id": note.id,
            "reference": note.reference,
            "content": note.content,
        });
        self.commit(StoreWrite::put(&note)?, action, payload).await?;

        tracing::debug!(
            target: "offline::annotations",
            id = %note.id,
            action = %action,
            "note saved"
        );
        Ok(note)
    }

    pub async fn delete_note(&self, id: &str) -> Result<bool, AppError> {
        let Some(note) = self.store.get::<Note>(id).await? else {
            return Ok(false);
        };
        let payload = json!({"id": note.id, "reference": note.reference});
        self.commit(
            StoreWrite::delete::<Note>(id),
            SyncActionType::DeleteNote,
            payload,
        )
        .await?;
        tracing::debug!(target: "offline::annotations", id, "note deleted");
        Ok(true)
    }

    pub async fn get_note(&self, id: &str) -> Result<Option<Note>, AppError> {
        self.store.get::<Note>(id).await
    }

    pub async fn get_notes_by_reference(&self, reference: &str) -> Result<Vec<Note>, AppError> {
        self.store.by_index::<Note>("reference", reference).await
    }

    pub async fn get_all_notes(&self) -> Result<Vec<Note>, AppError> {
        self.store.all::<Note>().await
    }

    pub async fn unsynced_notes(&self) -> Result<Vec<Note>, AppError> {
        self.store.by_index::<Note>("synced", "false").await
    }

    /// 既存 id への保存は色の変更として扱う
    pub async fn save_highlight(&self, draft: HighlightDraft) -> Result<Highlight, AppError> {
        let reference = require_reference(&draft.reference)?;
        let existing = match &draft.id {
            Some(id) => self.store.get::<Highlight>(id).await?,
            None => None,
        };
        let now = Utc::now();
        let color = draft
            .color
            .or_else(|| existing.as_ref().map(|highlight| highlight.color))
            .unwrap_or_default();
        let highlight = Highlight {
            id: draft.id.unwrap_or_else(new_id),
            reference,
            color,
            created_at: existing
                .as_ref()
                .map(|highlight| highlight.created_at)
                .unwrap_or(now),
            updated_at: now,
            synced: false,
        };

        let payload = json!({
            "id": highlight.id,
            "reference": highlight.reference,
            "color": highlight.color,
        });
        self.commit(
            StoreWrite::put(&highlight)?,
            SyncActionType::CreateHighlight,
            payload,
        )
        .await?;

        tracing::debug!(
            target: "offline::annotations",
            id = %highlight.id,
            color = %highlight.color,
            "highlight saved"
        );
        Ok(highlight)
    }

    pub async fn delete_highlight(&self, id: &str) -> Result<bool, AppError> {
        let Some(highlight) = self.store.get::<Highlight>(id).await? else {
            return Ok(false);
        };
        let payload = json!({"id": highlight.id, "reference": highlight.reference});
        self.commit(
            StoreWrite::delete::<Highlight>(id),
            SyncActionType::DeleteHighlight,
            payload,
        )
        .await?;
        tracing::debug!(target: "offline::annotations", id, "highlight deleted");
        Ok(true)
    }

    pub async fn get_highlight(&self, id: &str) -> Result<Option<Highlight>, AppError> {
        self.store.get::<Highlight>(id).await
    }

    pub async fn get_highlights_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<Highlight>, AppError> {
        self.store.by_index::<Highlight>("reference", reference).await
    }

    pub async fn get_all_highlights(&self) -> Result<Vec<Highlight>, AppError> {
        self.store.all::<Highlight>().await
    }

    pub async fn unsynced_highlights(&self) -> Result<Vec<Highlight>, AppError> {
        self.store.by_index::<Highlight>("synced", "false").await
    }

    /// エンティティを synced=true にする書き込み。既に削除済みなら None。
    ///
    /// 読み取り時点の `updatedAt` が変わっていれば適用時に見送られる
    pub async fn synced_write(
        &self,
        category: SyncCategory,
        id: &str,
    ) -> Result<Option<StoreWrite>, AppError> {
        match category {
            SyncCategory::Note => match self.store.get::<Note>(id).await? {
                Some(mut note) if !note.synced => {
                    let expected = revision(&note.updated_at)?;
                    note.synced = true;
                    Ok(Some(StoreWrite::put_if_unchanged(&note, "updatedAt", expected)?))
                }
                _ => Ok(None),
            },
            SyncCategory::Highlight => match self.store.get::<Highlight>(id).await? {
                Some(mut highlight) if !highlight.synced => {
                    let expected = revision(&highlight.updated_at)?;
                    highlight.synced = true;
                    Ok(Some(StoreWrite::put_if_unchanged(
                        &highlight,
                        "updatedAt",
                        expected,
                    )?))
                }
                _ => Ok(None),
            },
            SyncCategory::Activity => Ok(None),
        }
    }

    async fn commit(
        &self,
        entity_write: StoreWrite,
        action: SyncActionType,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let mut writes = vec![entity_write];
        if let Some(queue) = &self.sync_queue {
            let (_, queue_write) = queue.prepare_append(action, payload).await?;
            writes.push(queue_write);
        }
        self.store.apply(writes).await
    }
}

fn require_reference(reference: &str) -> Result<String, AppError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Reference must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn revision(updated_at: &DateTime<Utc>) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(updated_at).map_err(|err| AppError::SerializationError(err.to_string()))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
