pub mod analytics;
pub mod annotation_service;
pub mod connectivity_monitor;
pub mod content_cache;
pub mod sync_orchestrator;
pub mod sync_queue;

pub use analytics::AnalyticsLog;
pub use annotation_service::AnnotationStore;
pub use connectivity_monitor::ConnectivityMonitor;
pub use content_cache::ContentCache;
pub use sync_orchestrator::{SkipReason, SyncOrchestrator, SyncOutcome, SyncReport, SyncStatus};
pub use sync_queue::{SyncQueue, SyncQueueCounts};
