//! 快取層存儲模組
//!
//! L1（進程內）與 L2（遠端）都透過同一個非同步接口 [`TierStore`] 存取，
//! 編排層不需要區分兩者的呼叫方式。

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;

pub use memory::MokaStore;
pub use redis::RedisStore;

/// 快取層存儲接口
///
/// 實現必須是線程安全的；併發存取的一致性由實現自行保證。
#[async_trait]
pub trait TierStore: Send + Sync + 'static {
    /// 寫入單一鍵，返回實際被接納的條目數（可能因容量策略為 0）
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<usize, StoreError>;

    /// 批量寫入，返回實際被接納的條目數
    async fn batch_set(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<usize, StoreError>;

    /// 讀取單一鍵，`None` 表示未命中
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// 批量讀取，未命中的鍵不出現在結果中
    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    /// 刪除鍵
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 查詢剩餘存活時間，`None` 表示永不過期
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

#[async_trait]
impl<S: TierStore + ?Sized> TierStore for Arc<S> {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<usize, StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn batch_set(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<usize, StoreError> {
        (**self).batch_set(values, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        (**self).batch_get(keys).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        (**self).ttl(key).await
    }
}
