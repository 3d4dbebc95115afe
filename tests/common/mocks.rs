use async_trait::async_trait;
use selah_lib::application::ports::{
    BibleContentApi, ChapterContent, LocalStore, Partition, RemoteBook, RemoteChapter,
    RemoteVerse, StoreWrite, StoredRecord, SyncTransport,
};
use selah_lib::application::services::ContentCache;
use selah_lib::domain::entities::SyncQueueItem;
use selah_lib::shared::error::AppError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;

/// 書と章を固定で返すコンテンツAPI
pub struct FakeContentApi {
    books: Vec<(RemoteBook, Vec<RemoteChapter>)>,
    contents: HashMap<String, ChapterContent>,
    fetched: Mutex<Vec<String>>,
    book_list_calls: AtomicUsize,
    block_on_fetch: Option<usize>,
    cancel_on_fetch: Option<usize>,
    cache: OnceLock<Arc<ContentCache>>,
    fail_chapter: Option<String>,
    pub blocked: Notify,
}

#[allow(dead_code)]
impl FakeContentApi {
    /// GEN 3章、EXO 2章、各章2節
    pub fn sample() -> Self {
        let layout = [("GEN", "Genesis", 3u32), ("EXO", "Exodus", 2u32)];
        let mut books = Vec::new();
        let mut contents = HashMap::new();

        for (book_id, name, chapter_count) in layout {
            let mut chapters = Vec::new();
            for number in 1..=chapter_count {
                let id = format!("{book_id}.{number}");
                let reference = format!("{name} {number}");
                chapters.push(RemoteChapter {
                    id: id.clone(),
                    book_id: book_id.to_string(),
                    number: number.to_string(),
                    reference: reference.clone(),
                });
                contents.insert(
                    id.clone(),
                    ChapterContent {
                        id: id.clone(),
                        book_id: book_id.to_string(),
                        reference,
                        verses: vec![
                            RemoteVerse {
                                number: 1,
                                text: format!("{id} first verse"),
                            },
                            RemoteVerse {
                                number: 2,
                                text: format!("{id} second verse"),
                            },
                        ],
                    },
                );
            }
            books.push((
                RemoteBook {
                    id: book_id.to_string(),
                    abbreviation: book_id.to_string(),
                    name: name.to_string(),
                },
                chapters,
            ));
        }

        Self {
            books,
            contents,
            fetched: Mutex::new(Vec::new()),
            book_list_calls: AtomicUsize::new(0),
            block_on_fetch: None,
            cancel_on_fetch: None,
            cache: OnceLock::new(),
            fail_chapter: None,
            blocked: Notify::new(),
        }
    }

    /// n 回目の章取得だけ応答を返さない
    pub fn blocking_on_fetch(mut self, n: usize) -> Self {
        self.block_on_fetch = Some(n);
        self
    }

    /// n 回目の章取得の途中でダウンロードを取り消し、そのまま本文を返す
    pub fn cancelling_on_fetch(mut self, n: usize) -> Self {
        self.cancel_on_fetch = Some(n);
        self
    }

    pub fn attach(&self, cache: Arc<ContentCache>) {
        let _ = self.cache.set(cache);
    }

    pub fn failing_on(mut self, chapter_id: &str) -> Self {
        self.fail_chapter = Some(chapter_id.to_string());
        self
    }

    pub fn total_chapters(&self) -> usize {
        self.books.iter().map(|(_, chapters)| chapters.len()).sum()
    }

    pub fn fetched_chapters(&self) -> Vec<String> {
        self.fetched.lock().expect("fetched lock").clone()
    }

    pub fn book_list_calls(&self) -> usize {
        self.book_list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BibleContentApi for FakeContentApi {
    async fn list_books(&self, _translation_id: &str) -> Result<Vec<RemoteBook>, AppError> {
        self.book_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.books.iter().map(|(book, _)| book.clone()).collect())
    }

    async fn list_chapters(
        &self,
        _translation_id: &str,
        book_id: &str,
    ) -> Result<Vec<RemoteChapter>, AppError> {
        self.books
            .iter()
            .find(|(book, _)| book.id == book_id)
            .map(|(_, chapters)| chapters.clone())
            .ok_or_else(|| AppError::NotFound(book_id.to_string()))
    }

    async fn chapter_content(
        &self,
        translation_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterContent, AppError> {
        let count = {
            let mut fetched = self.fetched.lock().expect("fetched lock");
            fetched.push(chapter_id.to_string());
            fetched.len()
        };

        if self.fail_chapter.as_deref() == Some(chapter_id) {
            return Err(AppError::Network(format!("upstream error for {chapter_id}")));
        }
        if self.block_on_fetch == Some(count) {
            self.blocked.notify_one();
            std::future::pending::<()>().await;
        }
        if self.cancel_on_fetch == Some(count) {
            if let Some(cache) = self.cache.get() {
                cache.cancel_download(translation_id).await;
            }
        }

        self.contents
            .get(chapter_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(chapter_id.to_string()))
    }
}

/// 送信を記録し、指定したアイテムだけ失敗させる
#[derive(Default)]
pub struct ScriptedTransport {
    pushed: Mutex<Vec<i64>>,
    failing: Mutex<HashSet<i64>>,
    fail_all: Mutex<bool>,
    hold: Mutex<bool>,
    delay: Mutex<Duration>,
    pub entered: Notify,
    pub release: Notify,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn fail_item(&self, id: i64) {
        self.failing.lock().expect("failing lock").insert(id);
    }

    pub fn heal_item(&self, id: i64) {
        self.failing.lock().expect("failing lock").remove(&id);
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().expect("fail_all lock") = fail;
    }

    /// 次の送信を release されるまで止める
    pub fn hold_next(&self) {
        *self.hold.lock().expect("hold lock") = true;
    }

    /// 送信ごとに待つ時間
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = delay;
    }

    pub fn pushed(&self) -> Vec<i64> {
        self.pushed.lock().expect("pushed lock").clone()
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn push(&self, item: &SyncQueueItem) -> Result<(), AppError> {
        self.pushed.lock().expect("pushed lock").push(item.id);

        let hold = std::mem::take(&mut *self.hold.lock().expect("hold lock"));
        if hold {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let delay = *self.delay.lock().expect("delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fail = *self.fail_all.lock().expect("fail_all lock")
            || self.failing.lock().expect("failing lock").contains(&item.id);
        if fail {
            return Err(AppError::Network(format!("push rejected for {}", item.id)));
        }
        Ok(())
    }
}

/// 書き込みを止めたり失敗させたりできるストア
pub struct FaultyStore {
    inner: Arc<dyn LocalStore>,
    hold_guarded: AtomicBool,
    fail_batch_in: Mutex<Option<usize>>,
    failing_puts: Mutex<Option<Partition>>,
    pub held: Notify,
    pub resume: Notify,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new(inner: Arc<dyn LocalStore>) -> Self {
        Self {
            inner,
            hold_guarded: AtomicBool::new(false),
            fail_batch_in: Mutex::new(None),
            failing_puts: Mutex::new(None),
            held: Notify::new(),
            resume: Notify::new(),
        }
    }

    /// 次の条件付き書き込みを含むバッチを resume まで止める
    pub fn hold_guarded_batch(&self) {
        self.hold_guarded.store(true, Ordering::SeqCst);
    }

    /// ここから数えて n 回目のバッチを失敗させる
    pub fn fail_nth_batch(&self, n: usize) {
        *self.fail_batch_in.lock().expect("fail lock") = Some(n);
    }

    pub fn fail_puts_to(&self, partition: Partition) {
        *self.failing_puts.lock().expect("puts lock") = Some(partition);
    }

    fn batch_should_fail(&self) -> bool {
        let mut remaining = self.fail_batch_in.lock().expect("fail lock");
        match *remaining {
            Some(1) => {
                *remaining = None;
                true
            }
            Some(n) => {
                *remaining = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl LocalStore for FaultyStore {
    async fn put(&self, partition: Partition, record: StoredRecord) -> Result<(), AppError> {
        if *self.failing_puts.lock().expect("puts lock") == Some(partition) {
            return Err(AppError::Storage(format!("disk full writing {partition}")));
        }
        self.inner.put(partition, record).await
    }

    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, AppError> {
        self.inner.get(partition, key).await
    }

    async fn get_all(&self, partition: Partition) -> Result<Vec<Value>, AppError> {
        self.inner.get_all(partition).await
    }

    async fn get_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        self.inner.get_by_index(partition, index, value).await
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<bool, AppError> {
        self.inner.delete(partition, key).await
    }

    async fn delete_by_index(
        &self,
        partition: Partition,
        index: &str,
        value: &str,
    ) -> Result<u64, AppError> {
        self.inner.delete_by_index(partition, index, value).await
    }

    async fn clear(&self, partition: Partition) -> Result<u64, AppError> {
        self.inner.clear(partition).await
    }

    async fn count(&self, partition: Partition) -> Result<u64, AppError> {
        self.inner.count(partition).await
    }

    async fn next_sequence(&self, partition: Partition) -> Result<i64, AppError> {
        self.inner.next_sequence(partition).await
    }

    async fn write_batch(&self, writes: Vec<StoreWrite>) -> Result<u64, AppError> {
        if self.batch_should_fail() {
            return Err(AppError::Storage("disk I/O error".to_string()));
        }
        if writes.iter().any(StoreWrite::is_conditional)
            && self.hold_guarded.swap(false, Ordering::SeqCst)
        {
            self.held.notify_one();
            self.resume.notified().await;
        }
        self.inner.write_batch(writes).await
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        self.inner.try_acquire_lease(name, owner, ttl).await
    }

    async fn release_lease(&self, name: &str, owner: &str) -> Result<(), AppError> {
        self.inner.release_lease(name, owner).await
    }
}
