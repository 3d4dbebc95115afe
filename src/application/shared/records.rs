use crate::application::ports::local_store::{IndexEntry, Partition, Record};
use crate::domain::entities::{
    AnalyticsEvent, Book, Chapter, DownloadProgress, Highlight, MetadataEntry, Note, SyncQueueItem,
    Translation, Verse,
};

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

impl Record for Translation {
    const PARTITION: Partition = Partition::Translations;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("language", self.language.clone()),
            IndexEntry::new("downloaded", flag(self.downloaded)),
        ]
    }
}

impl Record for Book {
    const PARTITION: Partition = Partition::Books;

    fn key(&self) -> String {
        Book::store_key(&self.translation_id, &self.id)
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("translationId", self.translation_id.clone())]
    }
}

impl Record for Chapter {
    const PARTITION: Partition = Partition::Chapters;

    fn key(&self) -> String {
        Chapter::store_key(&self.translation_id, &self.id)
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("translationId", self.translation_id.clone()),
            IndexEntry::new("bookKey", self.book_key()),
        ]
    }
}

impl Record for Verse {
    const PARTITION: Partition = Partition::Verses;

    fn key(&self) -> String {
        Verse::store_key(&self.translation_id, &self.chapter_id, self.number)
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("translationId", self.translation_id.clone()),
            IndexEntry::new("chapterKey", self.chapter_key()),
            IndexEntry::new("reference", self.reference.clone()),
        ]
    }
}

impl Record for Note {
    const PARTITION: Partition = Partition::Notes;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("reference", self.reference.clone()),
            IndexEntry::new("synced", flag(self.synced)),
        ]
    }
}

impl Record for Highlight {
    const PARTITION: Partition = Partition::Highlights;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("reference", self.reference.clone()),
            IndexEntry::new("synced", flag(self.synced)),
        ]
    }
}

impl Record for SyncQueueItem {
    const PARTITION: Partition = Partition::SyncQueue;

    fn key(&self) -> String {
        sync_queue_key(self.id)
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![IndexEntry::new("status", self.status.as_str())];
        if let Some(entity_key) = self.entity_key() {
            entries.push(IndexEntry::new("entityKey", entity_key));
        }
        entries
    }
}

impl Record for DownloadProgress {
    const PARTITION: Partition = Partition::DownloadProgress;

    fn key(&self) -> String {
        self.translation_id.clone()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("status", self.status.as_str())]
    }
}

impl Record for AnalyticsEvent {
    const PARTITION: Partition = Partition::AnalyticsEvents;

    fn key(&self) -> String {
        format!("{:012}", self.id)
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("name", self.name.clone())]
    }
}

impl Record for MetadataEntry {
    const PARTITION: Partition = Partition::Metadata;

    fn key(&self) -> String {
        self.key.clone()
    }
}

/// 文字列順でも id 順になるようゼロ埋め
pub fn sync_queue_key(id: i64) -> String {
    format!("{id:012}")
}
