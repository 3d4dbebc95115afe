use crate::domain::value_objects::{SyncActionType, SyncQueueStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: i64,
    pub action_type: SyncActionType,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub status: SyncQueueStatus,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncQueueItem {
    pub fn pending(id: i64, action_type: SyncActionType, data: Value) -> Self {
        Self {
            id,
            action_type,
            data,
            created_at: Utc::now(),
            status: SyncQueueStatus::Pending,
            synced_at: None,
        }
    }

    /// ペイロードが参照するノート/ハイライトの id
    pub fn entity_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }

    /// カテゴリ込みのキー。アクティビティは対象エンティティを持たない
    pub fn entity_key(&self) -> Option<String> {
        let category = self.action_type.category();
        if category == crate::domain::value_objects::SyncCategory::Activity {
            return None;
        }
        self.entity_id().map(|id| category.entity_key(id))
    }

    pub fn complete(mut self, now: DateTime<Utc>) -> Self {
        self.status = SyncQueueStatus::Completed;
        self.synced_at = Some(now);
        self
    }
}
