use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub id: String,
    pub abbreviation: String,
    pub name: String,
    pub language: String,
    pub downloaded: bool,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub downloaded_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub translation_id: String,
    pub abbreviation: String,
    pub name: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub translation_id: String,
    pub book_id: String,
    pub number: String,
    pub reference: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    pub id: String,
    pub translation_id: String,
    pub book_id: String,
    pub chapter_id: String,
    pub number: u32,
    pub reference: String,
    pub content: String,
    pub cached_at: DateTime<Utc>,
}

impl Book {
    pub fn store_key(translation_id: &str, book_id: &str) -> String {
        format!("{translation_id}:{book_id}")
    }
}

impl Chapter {
    pub fn store_key(translation_id: &str, chapter_id: &str) -> String {
        format!("{translation_id}:{chapter_id}")
    }

    pub fn book_key(&self) -> String {
        Book::store_key(&self.translation_id, &self.book_id)
    }
}

impl Verse {
    pub fn store_key(translation_id: &str, chapter_id: &str, number: u32) -> String {
        format!("{translation_id}:{chapter_id}:{number}")
    }

    pub fn chapter_key(&self) -> String {
        Chapter::store_key(&self.translation_id, &self.chapter_id)
    }
}
