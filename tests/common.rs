#![allow(dead_code)]

use async_trait::async_trait;
use layered_cache::{CacheBuilder, JsonSerializer, LayeredCache, MokaStore, StoreError, TierStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 記錄呼叫次數的存儲，底層使用 MokaStore
pub struct CountingStore {
    inner: MokaStore,
    gets: AtomicUsize,
    batch_gets: AtomicUsize,
    sets: AtomicUsize,
    batch_sets: AtomicUsize,
    deletes: AtomicUsize,
    batch_get_keys: Mutex<Vec<Vec<String>>>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MokaStore::new(16 * 1024 * 1024).expect("valid capacity"),
            gets: AtomicUsize::new(0),
            batch_gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            batch_sets: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            batch_get_keys: Mutex::new(Vec::new()),
        })
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn batch_gets(&self) -> usize {
        self.batch_gets.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.sets.load(Ordering::SeqCst) + self.batch_sets.load(Ordering::SeqCst)
    }

    pub fn batch_sets(&self) -> usize {
        self.batch_sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn batch_get_keys(&self) -> Vec<Vec<String>> {
        self.batch_get_keys.lock().clone()
    }

    /// 直接讀取原始內容，不計入呼叫次數
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.expect("moka get never fails")
    }

    pub async fn peek_ttl(&self, key: &str) -> Option<Duration> {
        self.inner.ttl(key).await.ok().flatten()
    }
}

#[async_trait]
impl TierStore for CountingStore {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<usize, StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn batch_set(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<usize, StoreError> {
        self.batch_sets.fetch_add(1, Ordering::SeqCst);
        self.inner.batch_set(values, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        self.batch_gets.fetch_add(1, Ordering::SeqCst);
        self.batch_get_keys.lock().push(keys.to_vec());
        self.inner.batch_get(keys).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.inner.ttl(key).await
    }
}

/// 寫入一律失敗的存儲，讀取永遠未命中
pub struct FailingStore;

impl FailingStore {
    fn error() -> StoreError {
        StoreError::Connection("connection refused".to_string())
    }
}

#[async_trait]
impl TierStore for FailingStore {
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<usize, StoreError> {
        Err(Self::error())
    }

    async fn batch_set(
        &self,
        _values: HashMap<String, Vec<u8>>,
        _ttl: Duration,
    ) -> Result<usize, StoreError> {
        Err(Self::error())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn batch_get(&self, _keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        Ok(HashMap::new())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }
}

/// 依給定的層建立快取
pub fn cache_with(
    memory: Option<&Arc<CountingStore>>,
    remote: Option<&Arc<CountingStore>>,
) -> LayeredCache<JsonSerializer> {
    let mut builder = CacheBuilder::new();
    if let Some(store) = memory {
        builder = builder.memory(Arc::clone(store));
    }
    if let Some(store) = remote {
        builder = builder.remote(Arc::clone(store));
    }
    builder.build().expect("at least one tier configured")
}
