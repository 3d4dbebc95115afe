use crate::application::shared::TypedStore;
use crate::domain::entities::AnalyticsEvent;
use crate::shared::error::AppError;
use chrono::Utc;
use serde_json::Value;

pub const SYNC_STARTED: &str = "sync_started";
pub const SYNC_COMPLETED: &str = "sync_completed";
pub const SYNC_FAILED: &str = "sync_failed";
pub const CONNECTION_RESTORED: &str = "connection_restored";
pub const CONNECTION_LOST: &str = "connection_lost";

/// 端末内に残す分析イベントログ
#[derive(Clone)]
pub struct AnalyticsLog {
    store: TypedStore,
}

impl AnalyticsLog {
    pub fn new(store: TypedStore) -> Self {
        Self { store }
    }

    /// 記録に失敗しても呼び出し元の処理は止めない
    pub async fn record(&self, name: &str, properties: Value) -> Option<AnalyticsEvent> {
        match self.try_record(name, properties).await {
            Ok(event) => {
                tracing::info!(
                    target: "offline::analytics",
                    event = %event.name,
                    properties = %event.properties,
                    "analytics event recorded"
                );
                Some(event)
            }
            Err(err) => {
                tracing::warn!(
                    target: "offline::analytics",
                    event = name,
                    error = %err,
                    "failed to record analytics event"
                );
                None
            }
        }
    }

    async fn try_record(&self, name: &str, properties: Value) -> Result<AnalyticsEvent, AppError> {
        let event = AnalyticsEvent {
            id: self.store.next_id::<AnalyticsEvent>().await?,
            name: name.to_string(),
            properties,
            recorded_at: Utc::now(),
        };
        self.store.put(&event).await?;
        Ok(event)
    }

    pub async fn events(&self) -> Result<Vec<AnalyticsEvent>, AppError> {
        let mut events = self.store.all::<AnalyticsEvent>().await?;
        events.sort_by_key(|event| event.id);
        Ok(events)
    }

    pub async fn events_named(&self, name: &str) -> Result<Vec<AnalyticsEvent>, AppError> {
        let mut events = self.store.by_index::<AnalyticsEvent>("name", name).await?;
        events.sort_by_key(|event| event.id);
        Ok(events)
    }
}
