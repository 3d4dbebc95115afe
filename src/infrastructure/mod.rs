pub mod connectivity;
pub mod content;
pub mod database;
pub mod storage;
pub mod sync;
