use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 同期キューアイテムの状態。アイテムは削除されず、状態だけが遷移する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SyncQueueStatus {
    Pending,
    Completed,
    Failed {
        attempts: u32,
        last_error: String,
        retry_at: DateTime<Utc>,
    },
    DeadLetter {
        attempts: u32,
        last_error: String,
    },
}

impl SyncQueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncQueueStatus::Pending => "pending",
            SyncQueueStatus::Completed => "completed",
            SyncQueueStatus::Failed { .. } => "failed",
            SyncQueueStatus::DeadLetter { .. } => "dead_letter",
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SyncQueueStatus::Failed { attempts, .. } | SyncQueueStatus::DeadLetter { attempts, .. } => {
                *attempts
            }
            _ => 0,
        }
    }

    /// まだ同期が必要な状態（pending / failed）
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            SyncQueueStatus::Pending | SyncQueueStatus::Failed { .. }
        )
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self {
            SyncQueueStatus::Pending => true,
            SyncQueueStatus::Failed { retry_at, .. } => *retry_at <= now,
            _ => false,
        }
    }
}
