use crate::domain::entities::Translation;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};

/// ダウンロード可能な翻訳の静的な情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationInfo {
    pub id: String,
    pub abbreviation: String,
    pub name: String,
    pub language: String,
}

impl TranslationInfo {
    pub fn new(id: &str, abbreviation: &str, name: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            abbreviation: abbreviation.to_string(),
            name: name.to_string(),
            language: language.to_string(),
        }
    }

    /// ダウンロード開始時に作る未完了の Translation 行
    pub fn to_translation(&self) -> Translation {
        Translation {
            id: self.id.clone(),
            abbreviation: self.abbreviation.clone(),
            name: self.name.clone(),
            language: self.language.clone(),
            downloaded: false,
            downloaded_at: None,
            downloaded_size: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranslationCatalog {
    entries: Vec<TranslationInfo>,
}

impl TranslationCatalog {
    pub fn new(entries: Vec<TranslationInfo>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TranslationInfo] {
        &self.entries
    }

    pub fn find(&self, translation_id: &str) -> Option<&TranslationInfo> {
        self.entries.iter().find(|entry| entry.id == translation_id)
    }

    pub fn require(&self, translation_id: &str) -> Result<&TranslationInfo, AppError> {
        self.find(translation_id).ok_or_else(|| {
            AppError::NotFound(format!("Unknown translation: {translation_id}"))
        })
    }
}

impl Default for TranslationCatalog {
    fn default() -> Self {
        Self::new(vec![
            TranslationInfo::new("de4e12af7f28f599-02", "KJV", "King James Version", "eng"),
            TranslationInfo::new(
                "06125adad2d5898a-01",
                "ASV",
                "American Standard Version",
                "eng",
            ),
            TranslationInfo::new("9879dbb7cfe39e4d-04", "WEB", "World English Bible", "eng"),
        ])
    }
}
