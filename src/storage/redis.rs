use ::redis::{cmd, pipe, AsyncCommands};
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::redis::pool::RedisPool;
use crate::storage::TierStore;

/// 基於 Redis 的 L2 遠端快取
///
/// 可選的命名空間會加在每個鍵前面（`namespace:key`），
/// 讓多個應用共用同一個 Redis 而不互相覆蓋。
pub struct RedisStore<P: RedisPool> {
    pool: P,
    namespace: Option<String>,
}

impl<P: RedisPool> RedisStore<P> {
    /// 創建新的 Redis 快取
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            namespace: None,
        }
    }

    /// 設置鍵命名空間
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// 加上命名空間的完整鍵
    fn full_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.namespace {
            Some(ns) => Cow::Owned(format!("{}:{}", ns, key)),
            None => Cow::Borrowed(key),
        }
    }

    /// Redis 的 PX 至少為 1 毫秒
    fn ttl_millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

#[async_trait]
impl<P: RedisPool> TierStore for RedisStore<P> {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<usize, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.pool.get_conn().await?;

        cmd("SET")
            .arg(full_key.as_ref())
            .arg(value)
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis 快取設置失敗 [{}]: {}", full_key, e);
                StoreError::from(e)
            })?;

        debug!("Redis 快取設置成功: {} (TTL {:?})", full_key, ttl);
        Ok(1)
    }

    async fn batch_set(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<usize, StoreError> {
        if values.is_empty() {
            return Ok(0);
        }

        let count = values.len();
        let millis = Self::ttl_millis(ttl);
        let mut pipeline = pipe();
        for (key, value) in values {
            pipeline
                .cmd("SET")
                .arg(self.full_key(&key).as_ref())
                .arg(value)
                .arg("PX")
                .arg(millis)
                .ignore();
        }

        let mut conn = self.pool.get_conn().await?;
        pipeline.query_async::<()>(&mut conn).await.map_err(|e| {
            error!("Redis 批量設置失敗 ({} 個鍵): {}", count, e);
            StoreError::from(e)
        })?;

        debug!("Redis 批量設置成功: {} 個鍵", count);
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.pool.get_conn().await?;

        match conn.get::<_, Option<Vec<u8>>>(full_key.as_ref()).await {
            Ok(Some(value)) => {
                debug!("Redis 快取命中: {}", full_key);
                Ok(Some(value))
            }
            Ok(None) => {
                debug!("Redis 快取未命中: {}", full_key);
                Ok(None)
            }
            Err(e) => {
                error!("Redis 快取讀取失敗 [{}]: {}", full_key, e);
                Err(e.into())
            }
        }
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let full_keys: Vec<Cow<'_, str>> = keys.iter().map(|k| self.full_key(k)).collect();
        let mut conn = self.pool.get_conn().await?;

        let values: Vec<Option<Vec<u8>>> = cmd("MGET")
            .arg(full_keys.iter().map(|k| k.as_ref()).collect::<Vec<&str>>())
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis 批量讀取失敗 ({} 個鍵): {}", keys.len(), e);
                StoreError::from(e)
            })?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.pool.get_conn().await?;

        match conn.del::<_, u32>(full_key.as_ref()).await {
            Ok(deleted) => {
                debug!(
                    "Redis 快取刪除 {}: {}",
                    full_key,
                    if deleted > 0 { "成功" } else { "鍵不存在" }
                );
                Ok(())
            }
            Err(e) => {
                error!("Redis 快取刪除失敗 [{}]: {}", full_key, e);
                Err(e.into())
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.pool.get_conn().await?;

        let millis: i64 = cmd("PTTL")
            .arg(full_key.as_ref())
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from)?;

        match millis {
            -2 => Err(StoreError::NotFound(full_key.into_owned())),
            -1 => Ok(None),
            ms => Ok(Some(Duration::from_millis(ms.max(0) as u64))),
        }
    }
}
