use crate::domain::value_objects::DownloadStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub translation_id: String,
    pub status: DownloadStatus,
    pub progress: u8,
    pub current_step: String,
    pub chapters_total: u32,
    pub chapters_done: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn started(translation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            translation_id: translation_id.into(),
            status: DownloadStatus::Downloading,
            progress: 0,
            current_step: "Preparing download".to_string(),
            chapters_total: 0,
            chapters_done: 0,
            started_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// 進捗は単調増加。小さい値は無視する
    pub fn advance(&mut self, progress: u8, step: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.current_step = step.into();
        self.updated_at = Utc::now();
    }

    pub fn finish(&mut self, status: DownloadStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.error = error;
        if status == DownloadStatus::Completed {
            self.progress = 100;
            self.current_step = "Download complete".to_string();
            self.completed_at = Some(now);
        }
    }
}
