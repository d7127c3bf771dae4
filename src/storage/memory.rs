use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::StoreError;
use crate::storage::TierStore;

/// 內存快取條目，每個條目攜帶自己的 TTL
#[derive(Clone)]
struct MemoryEntry {
    data: Arc<Vec<u8>>,
    ttl: Duration,
    expires_at: Instant,
}

impl MemoryEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }
}

/// 依條目自身的 TTL 計算過期時間
struct PerEntryExpiry;

impl Expiry<String, MemoryEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// 基於 moka 的 L1 內存快取
///
/// 容量以位元組計算，每個條目的權重為鍵長度加值長度。
/// 權重超過總容量的條目直接拒絕，不計入接納數；
/// 其餘條目的淘汰與准入由 moka 自行處理（TinyLFU），寫入時無法得知之後是否被淘汰。
pub struct MokaStore {
    cache: Cache<String, MemoryEntry>,
    max_capacity_bytes: u64,
}

impl MokaStore {
    /// 創建新的內存快取
    ///
    /// # Arguments
    /// * `max_capacity_bytes` - 最大容量（位元組），必須大於 0
    pub fn new(max_capacity_bytes: u64) -> Result<Self, StoreError> {
        if max_capacity_bytes == 0 {
            return Err(StoreError::Other(format!(
                "無效的內存快取容量: {}",
                max_capacity_bytes
            )));
        }

        let cache = Cache::builder()
            .max_capacity(max_capacity_bytes)
            .weigher(|key: &String, value: &MemoryEntry| -> u32 {
                (key.len() + value.data.len())
                    .try_into()
                    .unwrap_or(u32::MAX)
            })
            .expire_after(PerEntryExpiry)
            .build();

        Ok(Self {
            cache,
            max_capacity_bytes,
        })
    }

    fn weight(key: &str, value: &[u8]) -> u64 {
        (key.len() + value.len()) as u64
    }

    /// 寫入單個條目，返回是否被接納
    async fn insert(&self, key: String, value: Vec<u8>, ttl: Duration) -> bool {
        let weight = Self::weight(&key, &value);
        if weight > self.max_capacity_bytes {
            debug!(
                "內存快取拒絕過大的條目: {} ({} 位元組，容量 {})",
                key, weight, self.max_capacity_bytes
            );
            // 拒絕時一併移除舊值
            self.cache.invalidate(&key).await;
            return false;
        }
        self.cache.insert(key, MemoryEntry::new(value, ttl)).await;
        true
    }

    /// 當前條目數（近似值）
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// 當前總權重（位元組）
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// 執行 moka 的待處理維護任務，讓統計數據即時反映
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl TierStore for MokaStore {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<usize, StoreError> {
        let admitted = self.insert(key.to_string(), value, ttl).await;
        Ok(usize::from(admitted))
    }

    async fn batch_set(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<usize, StoreError> {
        let mut count = 0;
        for (key, value) in values {
            if self.insert(key, value, ttl).await {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data.to_vec()))
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.cache.get(key.as_str()).await {
                found.insert(key.clone(), entry.data.to_vec());
            }
        }
        debug!("內存快取批量讀取: 請求 {} 個，命中 {} 個", keys.len(), found.len());
        Ok(found)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(
                entry.expires_at.saturating_duration_since(Instant::now()),
            )),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}
