pub mod records;
pub mod typed_store;

pub use records::sync_queue_key;
pub use typed_store::TypedStore;
