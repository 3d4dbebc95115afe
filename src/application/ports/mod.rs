pub mod connectivity_probe;
pub mod content_api;
pub mod local_store;
pub mod sync_transport;

pub use connectivity_probe::ConnectivityProbe;
pub use content_api::{BibleContentApi, ChapterContent, RemoteBook, RemoteChapter, RemoteVerse};
pub use local_store::{IndexEntry, LocalStore, Partition, Record, StoreWrite, StoredRecord};
pub use sync_transport::SyncTransport;
