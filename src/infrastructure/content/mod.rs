pub mod catalog;
pub mod chapter_text;
pub mod error;
pub mod http_content_api;

pub use catalog::{TranslationCatalog, TranslationInfo};
pub use error::ContentApiError;
pub use http_content_api::HttpBibleContentApi;
