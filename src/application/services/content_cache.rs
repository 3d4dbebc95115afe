use crate::application::ports::content_api::{BibleContentApi, RemoteBook, RemoteChapter};
use crate::application::ports::local_store::{Partition, StoreWrite};
use crate::application::shared::TypedStore;
use crate::domain::entities::{Book, Chapter, DownloadProgress, Translation, Verse};
use crate::domain::value_objects::DownloadStatus;
use crate::infrastructure::content::{TranslationCatalog, TranslationInfo};
use crate::shared::error::AppError;
use chrono::Utc;
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const STRUCTURE_SHARE: u32 = 5;
const CONTENT_SHARE: u32 = 85;
const FINALIZING: u8 = 95;

struct ActiveDownload {
    generation: u64,
    cancel: CancellationToken,
    // ダウンロード終了時にキャンセルされる
    finished: CancellationToken,
}

struct BookPlan {
    book: RemoteBook,
    chapters: Vec<RemoteChapter>,
}

/// 翻訳データのオフラインキャッシュ
pub struct ContentCache {
    store: TypedStore,
    api: Arc<dyn BibleContentApi>,
    catalog: TranslationCatalog,
    chapter_delay: Duration,
    downloads: Mutex<HashMap<String, ActiveDownload>>,
    next_generation: AtomicU64,
    verse_cache: Mutex<LruCache<String, Arc<Vec<Verse>>>>,
}

impl ContentCache {
    pub fn new(
        store: TypedStore,
        api: Arc<dyn BibleContentApi>,
        catalog: TranslationCatalog,
        chapter_delay: Duration,
        read_cache_chapters: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(read_cache_chapters).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            api,
            catalog,
            chapter_delay,
            downloads: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            verse_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn catalog(&self) -> &TranslationCatalog {
        &self.catalog
    }

    /// 翻訳をダウンロードしてキャッシュする。
    ///
    /// 章の本文がキャッシュ済みの章は取得し直さないため、
    /// キャンセルや失敗の後に呼ぶと続きから再開する。
    pub async fn download_translation<F>(
        &self,
        translation_id: &str,
        on_progress: F,
    ) -> Result<Translation, AppError>
    where
        F: Fn(&DownloadProgress) + Send + Sync,
    {
        let info = self.catalog.require(translation_id)?.clone();
        let (generation, cancel, finished) = self.register(translation_id).await;
        let _finished_guard = finished.drop_guard();

        tracing::info!(
            target: "offline::content",
            translation = translation_id,
            generation,
            "translation download started"
        );

        let mut progress = DownloadProgress::started(translation_id);
        let result = match self.publish(&progress, &on_progress).await {
            Ok(()) => {
                self.run_download(&info, &cancel, &mut progress, &on_progress)
                    .await
            }
            Err(err) => Err(err),
        };

        let is_current = self.unregister(translation_id, generation).await;

        match result {
            Ok(translation) => {
                progress.finish(DownloadStatus::Completed, None);
                self.publish(&progress, &on_progress).await?;
                tracing::info!(
                    target: "offline::content",
                    translation = translation_id,
                    size = translation.downloaded_size,
                    "translation download completed"
                );
                Ok(translation)
            }
            Err(err) => {
                let status = if err.is_canceled() {
                    DownloadStatus::Canceled
                } else {
                    DownloadStatus::Failed
                };
                let message = (status == DownloadStatus::Failed).then(|| err.to_string());
                progress.finish(status, message);
                // 新しいダウンロードに置き換えられていたら進捗行は触らない
                if is_current {
                    if let Err(persist_err) = self.publish(&progress, &on_progress).await {
                        tracing::warn!(
                            target: "offline::content",
                            translation = translation_id,
                            error = %persist_err,
                            "failed to persist final download status"
                        );
                    }
                }
                if err.is_canceled() {
                    tracing::info!(
                        target: "offline::content",
                        translation = translation_id,
                        "translation download canceled"
                    );
                } else {
                    tracing::error!(
                        target: "offline::content",
                        translation = translation_id,
                        error = %err,
                        "translation download failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// 実行中のダウンロードがあればキャンセルする
    pub async fn cancel_download(&self, translation_id: &str) -> bool {
        let downloads = self.downloads.lock().await;
        match downloads.get(translation_id) {
            Some(active) => {
                active.cancel.cancel();
                tracing::debug!(
                    target: "offline::content",
                    translation = translation_id,
                    "download cancellation requested"
                );
                true
            }
            None => false,
        }
    }

    pub async fn is_downloading(&self, translation_id: &str) -> bool {
        self.downloads.lock().await.contains_key(translation_id)
    }

    /// 翻訳と配下の書・章・節、進捗行をまとめて削除する
    pub async fn delete_translation(&self, translation_id: &str) -> Result<bool, AppError> {
        let finished = {
            let downloads = self.downloads.lock().await;
            downloads.get(translation_id).map(|active| {
                active.cancel.cancel();
                active.finished.clone()
            })
        };
        if let Some(finished) = finished {
            finished.cancelled().await;
        }

        let existed = self.store.get::<Translation>(translation_id).await?.is_some()
            || self
                .store
                .get::<DownloadProgress>(translation_id)
                .await?
                .is_some();

        self.store
            .apply(vec![
                StoreWrite::delete_by_index(Partition::Verses, "translationId", translation_id),
                StoreWrite::delete_by_index(Partition::Chapters, "translationId", translation_id),
                StoreWrite::delete_by_index(Partition::Books, "translationId", translation_id),
                StoreWrite::delete::<Translation>(translation_id),
                StoreWrite::delete::<DownloadProgress>(translation_id),
            ])
            .await?;

        self.evict_translation(translation_id).await;
        tracing::info!(
            target: "offline::content",
            translation = translation_id,
            existed,
            "translation deleted"
        );
        Ok(existed)
    }

    pub async fn list_translations(&self) -> Result<Vec<Translation>, AppError> {
        self.store.all::<Translation>().await
    }

    pub async fn get_translation(&self, translation_id: &str) -> Result<Option<Translation>, AppError> {
        self.store.get::<Translation>(translation_id).await
    }

    pub async fn get_books(&self, translation_id: &str) -> Result<Vec<Book>, AppError> {
        let mut books = self
            .store
            .by_index::<Book>("translationId", translation_id)
            .await?;
        books.sort_by_key(|book| book.position);
        Ok(books)
    }

    pub async fn get_chapters(
        &self,
        translation_id: &str,
        book_id: &str,
    ) -> Result<Vec<Chapter>, AppError> {
        let mut chapters = self
            .store
            .by_index::<Chapter>("bookKey", &Book::store_key(translation_id, book_id))
            .await?;
        chapters.sort_by_key(|chapter| chapter.position);
        Ok(chapters)
    }

    pub async fn get_chapter_verses(
        &self,
        translation_id: &str,
        chapter_id: &str,
    ) -> Result<Vec<Verse>, AppError> {
        let key = Chapter::store_key(translation_id, chapter_id);
        if let Some(cached) = self.verse_cache.lock().await.get(&key) {
            return Ok((**cached).clone());
        }

        let mut verses = self.store.by_index::<Verse>("chapterKey", &key).await?;
        verses.sort_by_key(|verse| verse.number);
        if !verses.is_empty() {
            self.verse_cache
                .lock()
                .await
                .put(key, Arc::new(verses.clone()));
        }
        Ok(verses)
    }

    pub async fn get_verses_by_reference(&self, reference: &str) -> Result<Vec<Verse>, AppError> {
        self.store.by_index::<Verse>("reference", reference).await
    }

    pub async fn get_download_progress(
        &self,
        translation_id: &str,
    ) -> Result<Option<DownloadProgress>, AppError> {
        self.store.get::<DownloadProgress>(translation_id).await
    }

    async fn run_download<F>(
        &self,
        info: &TranslationInfo,
        cancel: &CancellationToken,
        progress: &mut DownloadProgress,
        on_progress: &F,
    ) -> Result<Translation, AppError>
    where
        F: Fn(&DownloadProgress) + Send + Sync,
    {
        let translation_id = info.id.as_str();
        let mut translation = match self.store.get::<Translation>(translation_id).await? {
            Some(existing) => existing,
            None => {
                let fresh = info.to_translation();
                self.store.put(&fresh).await?;
                fresh
            }
        };

        progress.advance(0, "Fetching book list");
        self.publish(progress, on_progress).await?;
        let books = cancellable(cancel, translation_id, self.api.list_books(translation_id)).await?;

        let mut plan = Vec::with_capacity(books.len());
        let book_count = books.len().max(1) as u32;
        for (index, remote) in books.into_iter().enumerate() {
            let chapters = cancellable(
                cancel,
                translation_id,
                self.api.list_chapters(translation_id, &remote.id),
            )
            .await?;

            let book = Book {
                id: remote.id.clone(),
                translation_id: translation_id.to_string(),
                abbreviation: remote.abbreviation.clone(),
                name: remote.name.clone(),
                position: index as u32,
            };
            self.store.put(&book).await?;

            let share = STRUCTURE_SHARE * (index as u32 + 1) / book_count;
            progress.advance(share as u8, format!("Fetched chapters for {}", remote.name));
            self.publish(progress, on_progress).await?;
            plan.push(BookPlan {
                book: remote,
                chapters,
            });
        }

        let total: u32 = plan.iter().map(|entry| entry.chapters.len() as u32).sum();
        let cached: HashSet<String> = self
            .store
            .by_index::<Chapter>("translationId", translation_id)
            .await?
            .into_iter()
            .map(|chapter| chapter.id)
            .collect();
        progress.chapters_total = total;
        progress.advance(STRUCTURE_SHARE as u8, "Downloading chapters");
        self.publish(progress, on_progress).await?;

        if !cached.is_empty() {
            tracing::info!(
                target: "offline::content",
                translation = translation_id,
                cached = cached.len(),
                total,
                "resuming translation download"
            );
        }

        let mut done = 0u32;
        for entry in &plan {
            for (position, remote) in entry.chapters.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(canceled(translation_id));
                }

                if !cached.contains(&remote.id) {
                    let content = cancellable(
                        cancel,
                        translation_id,
                        self.api.chapter_content(translation_id, &remote.id),
                    )
                    .await?;
                    // 取得と同時に取り消された章は書かない
                    if cancel.is_cancelled() {
                        return Err(canceled(translation_id));
                    }

                    let chapter = Chapter {
                        id: remote.id.clone(),
                        translation_id: translation_id.to_string(),
                        book_id: entry.book.id.clone(),
                        number: remote.number.clone(),
                        reference: remote.reference.clone(),
                        position: position as u32,
                    };
                    let cached_at = Utc::now();
                    let mut writes = Vec::with_capacity(content.verses.len() + 3);
                    for verse in &content.verses {
                        translation.downloaded_size += verse.text.len() as u64;
                        writes.push(StoreWrite::put(&Verse {
                            id: format!("{}.{}", remote.id, verse.number),
                            translation_id: translation_id.to_string(),
                            book_id: entry.book.id.clone(),
                            chapter_id: remote.id.clone(),
                            number: verse.number,
                            reference: format!("{}:{}", content.reference, verse.number),
                            content: verse.text.clone(),
                            cached_at,
                        })?);
                    }
                    // 章の行は節と同じバッチで書く。章の行があれば本文取得済み
                    writes.push(StoreWrite::put(&chapter)?);
                    writes.push(StoreWrite::put(&translation)?);

                    done += 1;
                    progress.chapters_done = done;
                    progress.advance(
                        content_progress(done, total),
                        format!("Downloaded {}", remote.reference),
                    );
                    writes.push(StoreWrite::put(&*progress)?);
                    self.store.apply(writes).await?;
                    on_progress(&*progress);

                    if !self.chapter_delay.is_zero() && done < total {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(canceled(translation_id)),
                            _ = tokio::time::sleep(self.chapter_delay) => {}
                        }
                    }
                } else {
                    done += 1;
                    progress.chapters_done = done;
                    progress.advance(
                        content_progress(done, total),
                        format!("Skipped cached {}", remote.reference),
                    );
                }
            }
        }

        progress.advance(FINALIZING, "Finalizing");
        self.publish(progress, on_progress).await?;

        translation.downloaded = true;
        translation.downloaded_at = Some(Utc::now());
        self.store.put(&translation).await?;
        Ok(translation)
    }

    async fn publish<F>(&self, progress: &DownloadProgress, on_progress: &F) -> Result<(), AppError>
    where
        F: Fn(&DownloadProgress) + Send + Sync,
    {
        self.store.put(progress).await?;
        on_progress(progress);
        Ok(())
    }

    async fn register(&self, translation_id: &str) -> (u64, CancellationToken, CancellationToken) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let previous = self.downloads.lock().await.insert(
            translation_id.to_string(),
            ActiveDownload {
                generation,
                cancel: cancel.clone(),
                finished: finished.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::warn!(
                target: "offline::content",
                translation = translation_id,
                superseded = previous.generation,
                "download superseded by a newer request"
            );
            previous.cancel.cancel();
        }
        (generation, cancel, finished)
    }

    async fn unregister(&self, translation_id: &str, generation: u64) -> bool {
        let mut downloads = self.downloads.lock().await;
        match downloads.get(translation_id) {
            Some(active) if active.generation == generation => {
                downloads.remove(translation_id);
                true
            }
            _ => false,
        }
    }

    async fn evict_translation(&self, translation_id: &str) {
        let prefix = format!("{translation_id}:");
        let mut cache = self.verse_cache.lock().await;
        let stale: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}

fn content_progress(done: u32, total: u32) -> u8 {
    if total == 0 {
        return (STRUCTURE_SHARE + CONTENT_SHARE) as u8;
    }
    (STRUCTURE_SHARE + CONTENT_SHARE * done.min(total) / total) as u8
}

fn canceled(translation_id: &str) -> AppError {
    AppError::Canceled(format!("Download canceled: {translation_id}"))
}

async fn cancellable<T, Fut>(
    cancel: &CancellationToken,
    translation_id: &str,
    future: Fut,
) -> Result<T, AppError>
where
    Fut: Future<Output = Result<T, AppError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(canceled(translation_id)),
        result = future => result,
    }
}
