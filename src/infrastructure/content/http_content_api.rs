use super::chapter_text::parse_verses;
use super::error::ContentApiError;
use crate::application::ports::content_api::{
    BibleContentApi, ChapterContent, RemoteBook, RemoteChapter,
};
use crate::shared::config::ContentConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const API_KEY_HEADER: &str = "api-key";

const CHAPTER_QUERY: [(&str, &str); 6] = [
    ("content-type", "text"),
    ("include-notes", "false"),
    ("include-titles", "false"),
    ("include-chapter-numbers", "false"),
    ("include-verse-numbers", "true"),
    ("include-verse-spans", "false"),
];

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct BookDto {
    id: String,
    #[serde(default)]
    abbreviation: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterDto {
    id: String,
    book_id: String,
    number: String,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterContentDto {
    id: String,
    book_id: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    content: String,
}

/// api.bible 形式のREST APIクライアント
pub struct HttpBibleContentApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBibleContentApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &ContentConfig) -> Result<Self, AppError> {
        Self::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout),
        )
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ContentApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(ContentApiError::Unauthorized(status.as_u16())),
            404 => return Err(ContentApiError::NotFound(path.to_string())),
            429 => return Err(ContentApiError::RateLimited),
            code if !status.is_success() => return Err(ContentApiError::Status(code)),
            _ => {}
        }

        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|err| ContentApiError::Decode(err.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl BibleContentApi for HttpBibleContentApi {
    async fn list_books(&self, translation_id: &str) -> Result<Vec<RemoteBook>, AppError> {
        let books: Vec<BookDto> = self
            .get_data(&format!("/bibles/{translation_id}/books"), &[])
            .await?;
        Ok(books
            .into_iter()
            .map(|book| RemoteBook {
                abbreviation: book.abbreviation.unwrap_or_else(|| book.id.clone()),
                id: book.id,
                name: book.name,
            })
            .collect())
    }

    async fn list_chapters(
        &self,
        translation_id: &str,
        book_id: &str,
    ) -> Result<Vec<RemoteChapter>, AppError> {
        let chapters: Vec<ChapterDto> = self
            .get_data(
                &format!("/bibles/{translation_id}/books/{book_id}/chapters"),
                &[],
            )
            .await?;
        // 導入チャプターは節を持たない
        Ok(chapters
            .into_iter()
            .filter(|chapter| chapter.number != "intro")
            .map(|chapter| RemoteChapter {
                reference: chapter
                    .reference
                    .unwrap_or_else(|| format!("{} {}", chapter.book_id, chapter.number)),
                id: chapter.id,
                book_id: chapter.book_id,
                number: chapter.number,
            })
            .collect())
    }

    async fn chapter_content(
        &self,
        translation_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterContent, AppError> {
        let chapter: ChapterContentDto = self
            .get_data(
                &format!("/bibles/{translation_id}/chapters/{chapter_id}"),
                &CHAPTER_QUERY,
            )
            .await?;
        tracing::trace!(
            target: "offline::content",
            chapter = %chapter.id,
            bytes = chapter.content.len(),
            "fetched chapter content"
        );
        Ok(ChapterContent {
            verses: parse_verses(&chapter.content),
            reference: chapter.reference.unwrap_or_else(|| chapter.id.clone()),
            id: chapter.id,
            book_id: chapter.book_id,
        })
    }
}
