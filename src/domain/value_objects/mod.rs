pub mod download_status;
pub mod highlight_color;
pub mod retry_policy;
pub mod sync_action_type;
pub mod sync_queue_status;

pub use download_status::DownloadStatus;
pub use highlight_color::HighlightColor;
pub use retry_policy::RetryPolicy;
pub use sync_action_type::{SyncActionType, SyncCategory};
pub use sync_queue_status::SyncQueueStatus;
