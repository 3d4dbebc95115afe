pub mod analytics_event;
pub mod annotation;
pub mod download_progress;
pub mod sync_queue_item;
pub mod translation;

pub use analytics_event::{AnalyticsEvent, MetadataEntry};
pub use annotation::{Highlight, HighlightDraft, Note, NoteDraft};
pub use download_progress::DownloadProgress;
pub use sync_queue_item::SyncQueueItem;
pub use translation::{Book, Chapter, Translation, Verse};
