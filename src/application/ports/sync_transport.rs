use crate::domain::entities::SyncQueueItem;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// キューアイテムをリモートへ送るポート
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(&self, item: &SyncQueueItem) -> Result<(), AppError>;
}
