use crate::application::ports::sync_transport::SyncTransport;
use crate::domain::entities::SyncQueueItem;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::time::Duration;

/// リモートのノートAPIが無い間の送信先。固定の往復時間だけ待って成功する
pub struct SimulatedSyncTransport {
    round_trip: Duration,
}

impl SimulatedSyncTransport {
    pub fn new(round_trip: Duration) -> Self {
        Self { round_trip }
    }
}

#[async_trait]
impl SyncTransport for SimulatedSyncTransport {
    async fn push(&self, item: &SyncQueueItem) -> Result<(), AppError> {
        if !self.round_trip.is_zero() {
            tokio::time::sleep(self.round_trip).await;
        }
        tracing::trace!(
            target: "offline::sync",
            id = item.id,
            action = %item.action_type,
            "simulated push"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::SyncActionType;
    use serde_json::json;

    #[tokio::test]
    async fn push_waits_for_round_trip() {
        let transport = SimulatedSyncTransport::new(Duration::from_millis(20));
        let item = SyncQueueItem::pending(1, SyncActionType::CreateNote, json!({"id": "n1"}));
        let started = tokio::time::Instant::now();
        transport.push(&item).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
