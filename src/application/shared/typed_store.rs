use crate::application::ports::local_store::{LocalStore, Record, StoreWrite};
use crate::shared::error::AppError;
use std::sync::Arc;

/// ドメインレコードを型付きで読み書きするラッパー
#[derive(Clone)]
pub struct TypedStore {
    inner: Arc<dyn LocalStore>,
}

impl TypedStore {
    pub fn new(inner: Arc<dyn LocalStore>) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> &Arc<dyn LocalStore> {
        &self.inner
    }

    pub async fn put<T: Record>(&self, record: &T) -> Result<(), AppError> {
        self.inner.put(T::PARTITION, record.to_stored()?).await
    }

    pub async fn get<T: Record>(&self, key: &str) -> Result<Option<T>, AppError> {
        self.inner
            .get(T::PARTITION, key)
            .await?
            .map(T::from_value)
            .transpose()
    }

    pub async fn all<T: Record>(&self) -> Result<Vec<T>, AppError> {
        self.inner
            .get_all(T::PARTITION)
            .await?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    pub async fn by_index<T: Record>(&self, index: &str, value: &str) -> Result<Vec<T>, AppError> {
        self.inner
            .get_by_index(T::PARTITION, index, value)
            .await?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    pub async fn delete<T: Record>(&self, key: &str) -> Result<bool, AppError> {
        self.inner.delete(T::PARTITION, key).await
    }

    pub async fn count<T: Record>(&self) -> Result<u64, AppError> {
        self.inner.count(T::PARTITION).await
    }

    pub async fn next_id<T: Record>(&self) -> Result<i64, AppError> {
        self.inner.next_sequence(T::PARTITION).await
    }

    pub async fn apply(&self, writes: Vec<StoreWrite>) -> Result<(), AppError> {
        self.apply_checked(writes).await.map(|_| ())
    }

    /// 見送られた条件付き書き込みの件数を返す
    pub async fn apply_checked(&self, writes: Vec<StoreWrite>) -> Result<u64, AppError> {
        if writes.is_empty() {
            return Ok(0);
        }
        self.inner.write_batch(writes).await
    }
}
