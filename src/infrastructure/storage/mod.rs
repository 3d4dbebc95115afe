pub mod sqlite_local_store;

pub use sqlite_local_store::SqliteLocalStore;
