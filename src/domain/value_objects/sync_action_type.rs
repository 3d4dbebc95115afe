use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncActionType {
    CreateNote,
    UpdateNote,
    DeleteNote,
    CreateHighlight,
    DeleteHighlight,
    LogActivity,
}

/// 集計用のカテゴリ。処理順には影響しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCategory {
    Note,
    Highlight,
    Activity,
}

impl SyncActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncActionType::CreateNote => "create_note",
            SyncActionType::UpdateNote => "update_note",
            SyncActionType::DeleteNote => "delete_note",
            SyncActionType::CreateHighlight => "create_highlight",
            SyncActionType::DeleteHighlight => "delete_highlight",
            SyncActionType::LogActivity => "log_activity",
        }
    }

    pub fn category(&self) -> SyncCategory {
        match self {
            SyncActionType::CreateNote | SyncActionType::UpdateNote | SyncActionType::DeleteNote => {
                SyncCategory::Note
            }
            SyncActionType::CreateHighlight | SyncActionType::DeleteHighlight => {
                SyncCategory::Highlight
            }
            SyncActionType::LogActivity => SyncCategory::Activity,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            SyncActionType::DeleteNote | SyncActionType::DeleteHighlight
        )
    }
}

impl SyncCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncCategory::Note => "note",
            SyncCategory::Highlight => "highlight",
            SyncCategory::Activity => "activity",
        }
    }

    /// キューの entityKey インデックスに使うキー
    pub fn entity_key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

impl fmt::Display for SyncActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SyncActionType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "create_note" => Ok(SyncActionType::CreateNote),
            "update_note" => Ok(SyncActionType::UpdateNote),
            "delete_note" => Ok(SyncActionType::DeleteNote),
            "create_highlight" => Ok(SyncActionType::CreateHighlight),
            "delete_highlight" => Ok(SyncActionType::DeleteHighlight),
            "log_activity" => Ok(SyncActionType::LogActivity),
            other => Err(format!("Unknown sync action type: {other}")),
        }
    }
}
