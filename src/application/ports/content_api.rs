use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBook {
    pub id: String,
    pub abbreviation: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChapter {
    pub id: String,
    pub book_id: String,
    pub number: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVerse {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub id: String,
    pub book_id: String,
    pub reference: String,
    pub verses: Vec<RemoteVerse>,
}

/// 聖書コンテンツAPIのポート
#[async_trait]
pub trait BibleContentApi: Send + Sync {
    async fn list_books(&self, translation_id: &str) -> Result<Vec<RemoteBook>, AppError>;
    async fn list_chapters(
        &self,
        translation_id: &str,
        book_id: &str,
    ) -> Result<Vec<RemoteChapter>, AppError>;
    async fn chapter_content(
        &self,
        translation_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterContent, AppError>;
}
